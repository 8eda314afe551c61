//! Error types for the admin daemon and its HTTP handlers

use crate::presenter::ErrorPresenter;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
};
use larch_types::AdminError;
use std::sync::Arc;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler error carrying the admin error until the presenter renders it
#[derive(Debug, Clone)]
pub struct ApiError(pub AdminError);

/// Marker left in response extensions so the presentation layer can
/// re-render the body with request details and the configured policy.
#[derive(Debug, Clone)]
pub struct UnpresentedError(pub Arc<AdminError>);

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AdminError::validation("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(AdminError::validation("query", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(AdminError::validation("path", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = ErrorPresenter::production().render(&self.0, None).into_response();
        response
            .extensions_mut()
            .insert(UnpresentedError(Arc::new(self.0)));
        response
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
