//! Health and metrics handlers

use crate::api::rest::extract::RequestContext;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, http::header, response::IntoResponse, Json};
use larch_types::AdminError;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use super::ensure_permission;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Prometheus text exposition of the admin registry
pub async fn metrics(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<impl IntoResponse> {
    ensure_permission(&state, &ctx, &state.permissions.metrics_view, "metrics").await?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.admin.metrics().gather(), &mut buffer)
        .map_err(|e| AdminError::internal(format!("encode metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer))
}
