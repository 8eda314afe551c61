//! Translation queue handlers

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use larch_features::keys;
use larch_translation::{
    AssignmentAction, AssignmentFilter, BulkAssignmentAction, BulkOutcome, NewAssignment, QueueOperation,
    TranslationAssignment,
};
use larch_types::{AdminContext, AdminError, AdminResult};
use serde::{Deserialize, Serialize};

use super::{ensure_feature, ensure_permission};

const RESOURCE: &str = "translations";

fn permission_for(state: &AppState, op: QueueOperation) -> &str {
    let permissions = &state.permissions;
    match op {
        QueueOperation::Claim | QueueOperation::Release | QueueOperation::SubmitReview => {
            &permissions.translations_claim
        }
        QueueOperation::Assign => &permissions.translations_assign,
        QueueOperation::Approve | QueueOperation::Reject => &permissions.translations_review,
        QueueOperation::Publish | QueueOperation::Archive => &permissions.translations_manage,
    }
}

fn parse_operation(name: &str) -> AdminResult<QueueOperation> {
    QueueOperation::parse(name).ok_or_else(|| AdminError::not_found("queue operation", name))
}

async fn guard(state: &AppState, ctx: &AdminContext, permission: &str) -> ApiResult<()> {
    ensure_feature(state, ctx, keys::TRANSLATION_QUEUE).await?;
    ensure_permission(state, ctx, permission, RESOURCE).await
}

pub async fn list_assignments(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(filter): ApiQuery<AssignmentFilter>,
) -> ApiResult<Json<Vec<TranslationAssignment>>> {
    guard(&state, &ctx, &state.permissions.translations_view).await?;
    Ok(Json(state.admin.queue().list(&ctx, &filter).await?))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiJson(mut input): ApiJson<NewAssignment>,
) -> ApiResult<(StatusCode, Json<TranslationAssignment>)> {
    let permission = if input.assignee_id.is_some() {
        &state.permissions.translations_assign
    } else {
        &state.permissions.translations_manage
    };
    guard(&state, &ctx, permission).await?;
    input.actor_id = String::new();
    let assignment = state.admin.queue().create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<TranslationAssignment>> {
    guard(&state, &ctx, &state.permissions.translations_view).await?;
    Ok(Json(state.admin.queue().get(&ctx, &id).await?))
}

/// Body of a single lifecycle operation; the id comes from the path
#[derive(Debug, Default, Deserialize)]
pub struct OperationRequest {
    #[serde(default)]
    pub expected_version: u64,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Run one lifecycle verb and return the mutated assignment
pub async fn run_assignment_operation(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((id, op)): ApiPath<(String, String)>,
    ApiJson(request): ApiJson<OperationRequest>,
) -> ApiResult<Json<TranslationAssignment>> {
    let op = parse_operation(&op)?;
    guard(&state, &ctx, permission_for(&state, op)).await?;
    let action = AssignmentAction {
        id,
        expected_version: request.expected_version,
        actor_id: String::new(),
        assignee_id: request.assignee_id,
        reason: request.reason,
        idempotency_key: request.idempotency_key,
    };
    Ok(Json(state.admin.queue().execute(&ctx, op, action).await?))
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub operation: QueueOperation,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkOutcome>,
}

/// Run one lifecycle verb over several assignments
pub async fn run_bulk_assignment_operation(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(op): ApiPath<String>,
    ApiJson(mut input): ApiJson<BulkAssignmentAction>,
) -> ApiResult<Json<BulkResponse>> {
    let op = parse_operation(&op)?;
    guard(&state, &ctx, permission_for(&state, op)).await?;
    // the actor is always the caller
    input.actor_id = String::new();
    let results = state.admin.queue().execute_bulk(&ctx, op, input).await?;
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    Ok(Json(BulkResponse {
        operation: op,
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}
