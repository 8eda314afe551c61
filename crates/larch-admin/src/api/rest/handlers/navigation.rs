//! Navigation and global search handlers

use crate::api::rest::extract::{ApiQuery, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use larch_features::keys;
use larch_panel::{MenuItem, SearchHit};
use serde::{Deserialize, Serialize};

use super::ensure_feature;

/// Search results cap when `limit` is absent
const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct NavigationQuery {
    #[serde(default)]
    pub menu: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub menu: String,
    pub items: Vec<MenuItem>,
}

/// Items of a menu the actor may see
pub async fn get_navigation(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(query): ApiQuery<NavigationQuery>,
) -> ApiResult<Json<NavigationResponse>> {
    let menu = query
        .menu
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.admin.config().nav_menu_code.clone());

    let mut items = Vec::new();
    for item in state.admin.navigation(&ctx, &menu).await? {
        let mut allowed = true;
        for permission in &item.permissions {
            if !state.admin.authorizer().can(&ctx, permission, "navigation").await {
                allowed = false;
                break;
            }
        }
        if allowed {
            items.push(item);
        }
    }
    Ok(Json(NavigationResponse { menu, items }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// Search across panels the actor can view
pub async fn search(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    ensure_feature(&state, &ctx, keys::SEARCH).await?;
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let hits = state.admin.registry().search(&ctx, query.q.trim(), limit).await?;
    Ok(Json(SearchResponse { query: query.q, hits }))
}
