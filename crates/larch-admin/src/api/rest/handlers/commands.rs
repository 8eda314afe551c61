//! Command catalog and name-based dispatch

use crate::api::rest::extract::{ApiJson, ApiPath, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use larch_features::keys;
use larch_types::Record;
use serde::Serialize;
use serde_json::Value;

use super::{ensure_feature, ensure_permission};

#[derive(Debug, Serialize)]
pub struct CommandList {
    pub commands: Vec<String>,
}

/// Registered command names, sorted
pub async fn list_commands(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Json<CommandList>> {
    ensure_feature(&state, &ctx, keys::COMMANDS).await?;
    ensure_permission(&state, &ctx, &state.permissions.commands_view, "commands").await?;
    Ok(Json(CommandList {
        commands: state.admin.commands().names().await,
    }))
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Dispatch a command by name with the body as payload
pub async fn execute_command(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(name): ApiPath<String>,
    ApiJson(payload): ApiJson<Record>,
) -> ApiResult<Json<CommandResponse>> {
    ensure_feature(&state, &ctx, keys::COMMANDS).await?;
    ensure_permission(&state, &ctx, &state.permissions.commands_execute, &name).await?;
    let result = state.admin.commands().dispatch_by_name(&ctx, &name, payload).await?;
    tracing::info!(command = %name, user_id = ctx.user_id(), "Command executed");
    Ok(Json(CommandResponse { command: name, result }))
}
