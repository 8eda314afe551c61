//! Feature resolution and override handlers

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use larch_features::{is_enabled, set_override, unset_override, FeatureScope, ScopeKind};
use larch_types::{normalize_key, AdminError, AdminResult};
use serde::{Deserialize, Serialize};

use super::ensure_permission;

/// Override target; system scope when absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeParams {
    #[serde(default)]
    pub scope: Option<ScopeKind>,
    #[serde(default)]
    pub scope_id: Option<String>,
}

impl ScopeParams {
    fn to_scope(&self) -> AdminResult<FeatureScope> {
        let id = self.scope_id.as_deref().map(str::trim).unwrap_or_default();
        match self.scope.unwrap_or(ScopeKind::System) {
            ScopeKind::System => Ok(FeatureScope::system()),
            _ if id.is_empty() => Err(AdminError::validation("scope_id", "scope id is required")),
            ScopeKind::User => Ok(FeatureScope::user(id)),
            ScopeKind::Org => Ok(FeatureScope::org(id)),
            ScopeKind::Tenant => Ok(FeatureScope::tenant(id)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetFeatureRequest {
    pub enabled: bool,
    #[serde(flatten)]
    pub scope: ScopeParams,
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub key: String,
    pub enabled: bool,
}

/// Resolved value for the request's scope chain
pub async fn get_feature(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(key): ApiPath<String>,
) -> ApiResult<Json<FeatureResponse>> {
    ensure_permission(&state, &ctx, &state.permissions.features_view, "features").await?;
    let key = normalize_key(&key);
    let enabled = is_enabled(state.admin.features().as_ref(), &ctx, &key).await?;
    Ok(Json(FeatureResponse { key, enabled }))
}

/// Set an override at the given scope
pub async fn set_feature(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(key): ApiPath<String>,
    ApiJson(request): ApiJson<SetFeatureRequest>,
) -> ApiResult<Json<FeatureResponse>> {
    ensure_permission(&state, &ctx, &state.permissions.features_edit, "features").await?;
    let key = normalize_key(&key);
    let scope = request.scope.to_scope()?;
    set_override(state.admin.features().as_ref(), &ctx, &key, &scope, request.enabled).await?;
    tracing::info!(feature = %key, scope = %scope, enabled = request.enabled, "Feature override set");
    let enabled = is_enabled(state.admin.features().as_ref(), &ctx, &key).await?;
    Ok(Json(FeatureResponse { key, enabled }))
}

/// Remove an override; scope comes from the query string
pub async fn unset_feature(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(key): ApiPath<String>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<StatusCode> {
    ensure_permission(&state, &ctx, &state.permissions.features_edit, "features").await?;
    let key = normalize_key(&key);
    let scope = params.to_scope()?;
    unset_override(state.admin.features().as_ref(), &ctx, &key, &scope).await?;
    tracing::info!(feature = %key, scope = %scope, "Feature override removed");
    Ok(StatusCode::NO_CONTENT)
}
