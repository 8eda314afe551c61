//! Generic panel CRUD and action handlers

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, RequestContext};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use larch_features::keys;
use larch_panel::{Action, ActionRequest, DynamicPanelFactory, ListOptions, ListResult, Panel};
use larch_types::{AdminContext, AdminError, AdminResult, Record};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::ensure_feature;

/// Query keys consumed by the context or the listing itself
const RESERVED_QUERY_KEYS: &[&str] = &[
    "page",
    "per_page",
    "sort",
    "sort_by",
    "order",
    "search",
    "q",
    "locale",
    "env",
    "environment",
    "render_mode",
];

/// Environment-specific panel first, then the shared one.
async fn find_panel(state: &AppState, ctx: &AdminContext, name: &str) -> AdminResult<Arc<Panel>> {
    let registry = state.admin.registry();
    if !ctx.environment().is_empty() {
        let scoped = DynamicPanelFactory::panel_name(name, ctx.environment());
        if let Some(panel) = registry.get(&scoped).await {
            return Ok(panel);
        }
    }
    registry.require(name).await
}

fn parse_number(query: &HashMap<String, String>, key: &str) -> AdminResult<u32> {
    match query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AdminError::validation(key, format!("{key} must be a positive integer"))),
        None => Ok(0),
    }
}

/// `?page=2&per_page=10&sort=-title&q=draft&status=published`
fn list_options(query: &HashMap<String, String>) -> AdminResult<ListOptions> {
    let mut options = ListOptions::default()
        .page(parse_number(query, "page")?)
        .per_page(parse_number(query, "per_page")?);

    let sort = query
        .get("sort")
        .or_else(|| query.get("sort_by"))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    if let Some(sort) = sort {
        let descending = sort.starts_with('-')
            || query
                .get("order")
                .is_some_and(|o| o.eq_ignore_ascii_case("desc"));
        options = options.sort_by(sort.trim_start_matches('-'), descending);
    }

    if let Some(search) = query.get("q").or_else(|| query.get("search")) {
        options = options.search(search.clone());
    }
    for (key, value) in query {
        if !RESERVED_QUERY_KEYS.contains(&key.as_str()) {
            options = options.filter(key.clone(), value.clone());
        }
    }
    Ok(options)
}

/// Panels the actor can view
pub async fn list_panels(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Json<Vec<Value>>> {
    let mut panels = Vec::new();
    for panel in state.admin.registry().list().await {
        if panel.can_view(&ctx).await {
            panels.push(panel.describe());
        }
    }
    Ok(Json(panels))
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub panel: String,
    #[serde(flatten)]
    pub result: ListResult,
}

pub async fn list_records(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(panel): ApiPath<String>,
    ApiQuery(query): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    let result = panel.list(&ctx, list_options(&query)?).await?;
    Ok(Json(ListResponse {
        panel: panel.name().to_string(),
        result,
    }))
}

pub async fn create_record(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath(panel): ApiPath<String>,
    ApiJson(record): ApiJson<Record>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    let created = panel.create(&ctx, record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_record(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, id)): ApiPath<(String, String)>,
) -> ApiResult<Json<Record>> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    Ok(Json(panel.get(&ctx, &id).await?))
}

pub async fn update_record(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, id)): ApiPath<(String, String)>,
    ApiJson(record): ApiJson<Record>,
) -> ApiResult<Json<Record>> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    Ok(Json(panel.update(&ctx, &id, record).await?))
}

pub async fn delete_record(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, id)): ApiPath<(String, String)>,
) -> ApiResult<StatusCode> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    panel.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Actions offered for a record in its current state
pub async fn record_actions(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, id)): ApiPath<(String, String)>,
) -> ApiResult<Json<Vec<Value>>> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    let record = panel.get(&ctx, &id).await?;
    let actions = panel.available_actions(&ctx, &record).await?;
    Ok(Json(actions.iter().map(Action::describe).collect()))
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub panel: String,
    pub action: String,
    pub result: Value,
}

pub async fn run_action(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, action)): ApiPath<(String, String)>,
    ApiJson(request): ApiJson<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let panel = find_panel(&state, &ctx, &panel).await?;
    let result = panel.run_action(&ctx, &action, request).await?;
    tracing::info!(panel = %panel.name(), action = %action, user_id = ctx.user_id(), "Panel action executed");
    Ok(Json(ActionResponse {
        panel: panel.name().to_string(),
        action,
        result: result.unwrap_or_else(|| json!({ "ok": true })),
    }))
}

pub async fn run_bulk_action(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    ApiPath((panel, action)): ApiPath<(String, String)>,
    ApiJson(request): ApiJson<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    ensure_feature(&state, &ctx, keys::BULK).await?;
    let panel = find_panel(&state, &ctx, &panel).await?;
    let result = panel.run_bulk_action(&ctx, &action, request).await?;
    tracing::info!(panel = %panel.name(), action = %action, user_id = ctx.user_id(), "Panel bulk action executed");
    Ok(Json(ActionResponse {
        panel: panel.name().to_string(),
        action,
        result: result.unwrap_or_else(|| json!({ "ok": true })),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_list_options_from_query() {
        let options = list_options(&query(&[
            ("page", "2"),
            ("per_page", "10"),
            ("sort", "-title"),
            ("q", "draft"),
            ("status", "published"),
            ("locale", "es"),
        ]))
        .unwrap();
        assert_eq!(options.page, 2);
        assert_eq!(options.per_page, 10);
        assert_eq!(options.sort_by.as_deref(), Some("title"));
        assert!(options.sort_desc);
        assert_eq!(options.search, "draft");
        assert_eq!(options.filters.len(), 1);
        assert_eq!(options.filters["status"], json!("published"));
    }

    #[test]
    fn test_bad_page_rejected() {
        let err = list_options(&query(&[("page", "two")])).unwrap_err();
        assert_eq!(err.text_code(), "VALIDATION_ERROR");
    }
}
