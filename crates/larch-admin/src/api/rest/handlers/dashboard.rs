//! Dashboard handlers

use crate::api::rest::extract::{ApiJson, RequestContext};
use crate::api::rest::state::AppState;
use crate::dashboard::{DashboardPreferences, Widget, DASHBOARD_RESOURCE};
use crate::error::ApiResult;
use axum::{extract::State, Json};
use larch_features::keys;
use serde::Serialize;

use super::{ensure_feature, ensure_permission};

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub title: String,
    pub widgets: Vec<Widget>,
}

/// Render the actor's widgets
pub async fn get_dashboard(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Json<DashboardResponse>> {
    ensure_feature(&state, &ctx, keys::DASHBOARD).await?;
    ensure_permission(&state, &ctx, &state.permissions.dashboard_view, DASHBOARD_RESOURCE).await?;
    let widgets = state.admin.dashboard().render(&ctx).await?;
    Ok(Json(DashboardResponse {
        title: state.admin.config().title.clone(),
        widgets,
    }))
}

pub async fn get_dashboard_preferences(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Json<DashboardPreferences>> {
    ensure_feature(&state, &ctx, keys::DASHBOARD).await?;
    ensure_permission(&state, &ctx, &state.permissions.dashboard_view, DASHBOARD_RESOURCE).await?;
    Ok(Json(state.admin.dashboard().preferences(&ctx).await?))
}

pub async fn save_dashboard_preferences(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiJson(prefs): ApiJson<DashboardPreferences>,
) -> ApiResult<Json<DashboardPreferences>> {
    ensure_feature(&state, &ctx, keys::DASHBOARD).await?;
    ensure_permission(&state, &ctx, &state.permissions.dashboard_preferences, DASHBOARD_RESOURCE).await?;
    let saved = state.admin.dashboard().save_preferences(&ctx, prefs).await?;
    tracing::info!(user_id = ctx.user_id(), "Dashboard preferences saved");
    Ok(Json(saved))
}
