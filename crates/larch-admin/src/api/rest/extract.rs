//! Extractors rejecting with the admin error shape

use super::state::AppState;
use crate::context::query_params;
use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use larch_types::{Actor, AdminContext};

/// `axum::Json` with validation-shaped rejections
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with validation-shaped rejections
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with validation-shaped rejections
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// The request's [`AdminContext`]
///
/// The actor comes from the authentication middleware; locale, environment
/// and render mode from the query string, headers and configured defaults.
#[derive(Debug, Clone)]
pub struct RequestContext(pub AdminContext);

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let actor = parts.extensions.get::<Actor>().cloned();
        let query = query_params(&parts.uri);
        let ctx = state
            .admin
            .context_resolver()
            .resolve(&parts.headers, &query, actor)?;
        Ok(RequestContext(ctx))
    }
}
