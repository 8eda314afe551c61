//! Workflow and binding management handlers

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use larch_features::keys;
use larch_types::{AdminContext, AdminError};
use larch_workflow::{
    BindingFilter, BindingQuery, BindingUpdate, NewBinding, NewWorkflow, PersistedWorkflow, ResolvedBinding,
    WorkflowBinding, WorkflowFilter, WorkflowRevision, WorkflowUpdate,
};
use serde::{Deserialize, Serialize};

use super::{ensure_feature, ensure_permission};

const RESOURCE: &str = "workflows";

async fn guard(state: &AppState, ctx: &AdminContext, edit: bool) -> ApiResult<()> {
    ensure_feature(state, ctx, keys::WORKFLOWS).await?;
    let permission = if edit {
        &state.permissions.workflows_edit
    } else {
        &state.permissions.workflows_view
    };
    ensure_permission(state, ctx, permission, RESOURCE).await
}

pub async fn list_workflows(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(filter): ApiQuery<WorkflowFilter>,
) -> ApiResult<Json<Vec<PersistedWorkflow>>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().list_workflows(&ctx, &filter).await?))
}

pub async fn create_workflow(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiJson(input): ApiJson<NewWorkflow>,
) -> ApiResult<(StatusCode, Json<PersistedWorkflow>)> {
    guard(&state, &ctx, true).await?;
    let workflow = state.admin.workflows().create_workflow(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<PersistedWorkflow>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().get_workflow(&ctx, &id).await?))
}

/// Update body: either a partial update or a rollback target
#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub rollback_to_version: Option<u64>,
    #[serde(flatten)]
    pub update: WorkflowUpdate,
}

pub async fn update_workflow(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateWorkflowRequest>,
) -> ApiResult<Json<PersistedWorkflow>> {
    guard(&state, &ctx, true).await?;
    let expected = request
        .expected_version
        .ok_or_else(|| AdminError::validation("expected_version", "expected_version is required"))?;
    let runtime = state.admin.workflows();
    let workflow = match request.rollback_to_version {
        Some(target) => runtime.rollback_workflow(&ctx, &id, target, expected).await?,
        None => runtime.update_workflow(&ctx, &id, request.update, expected).await?,
    };
    Ok(Json(workflow))
}

pub async fn list_workflow_revisions(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Vec<WorkflowRevision>>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().list_revisions(&ctx, &id).await?))
}

pub async fn get_workflow_revision(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((id, version)): ApiPath<(String, u64)>,
) -> ApiResult<Json<WorkflowRevision>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().get_workflow_version(&ctx, &id, version).await?))
}

pub async fn list_bindings(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(filter): ApiQuery<BindingFilter>,
) -> ApiResult<Json<Vec<WorkflowBinding>>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().list_bindings(&ctx, &filter).await?))
}

pub async fn create_binding(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiJson(input): ApiJson<NewBinding>,
) -> ApiResult<(StatusCode, Json<WorkflowBinding>)> {
    guard(&state, &ctx, true).await?;
    let binding = state.admin.workflows().create_binding(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(binding)))
}

pub async fn get_binding(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<WorkflowBinding>> {
    guard(&state, &ctx, false).await?;
    Ok(Json(state.admin.workflows().get_binding(&ctx, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBindingRequest {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(flatten)]
    pub update: BindingUpdate,
}

pub async fn update_binding(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateBindingRequest>,
) -> ApiResult<Json<WorkflowBinding>> {
    guard(&state, &ctx, true).await?;
    let expected = request
        .expected_version
        .ok_or_else(|| AdminError::validation("expected_version", "expected_version is required"))?;
    let binding = state
        .admin
        .workflows()
        .update_binding(&ctx, &id, request.update, expected)
        .await?;
    Ok(Json(binding))
}

pub async fn delete_binding(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    guard(&state, &ctx, true).await?;
    state.admin.workflows().delete_binding(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `traits` is a comma-separated list
#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub traits: String,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub binding: Option<ResolvedBinding>,
}

/// Resolve the binding that governs a content type
pub async fn resolve_binding(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(query): ApiQuery<ResolveQuery>,
) -> ApiResult<Json<ResolveResponse>> {
    guard(&state, &ctx, false).await?;
    let environment = query
        .environment
        .unwrap_or_else(|| ctx.environment().to_string());
    let binding_query = BindingQuery::new(query.content_type)
        .with_traits(query.traits.split(',').map(str::trim).filter(|t| !t.is_empty()))
        .with_environment(environment);
    let binding = state.admin.workflows().resolve_binding(&ctx, &binding_query).await?;
    Ok(Json(ResolveResponse { binding }))
}
