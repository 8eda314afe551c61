//! Error presentation
//!
//! Arbitrary errors are classified into an [`AdminError`] through an
//! ordered list of [`ErrorMapper`]s (first match wins, unmatched errors
//! become `internal`), then rendered as
//! `{code, text_code, category, message, metadata?, stack?}`.
//!
//! Production policy replaces any message whose identifiers are not in the
//! metadata with a fixed category message; dev mode keeps the full message
//! and adds the cause chain as `stack`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use larch_types::{AdminError, ErrorCategory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::sync::Arc;

/// Maps a foreign error into the taxonomy
pub trait ErrorMapper: Send + Sync {
    fn map(&self, err: &(dyn StdError + 'static)) -> Option<AdminError>;
}

/// Passes admin errors through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminErrorMapper;

impl ErrorMapper for AdminErrorMapper {
    fn map(&self, err: &(dyn StdError + 'static)) -> Option<AdminError> {
        err.downcast_ref::<AdminError>().cloned()
    }
}

/// Malformed JSON is a validation failure
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorMapper;

impl ErrorMapper for JsonErrorMapper {
    fn map(&self, err: &(dyn StdError + 'static)) -> Option<AdminError> {
        err.downcast_ref::<serde_json::Error>()
            .map(|e| AdminError::validation("body", e.to_string()))
    }
}

/// Adapts a closure into a mapper.
pub struct FnMapper<F>(pub F);

impl<F> ErrorMapper for FnMapper<F>
where
    F: Fn(&(dyn StdError + 'static)) -> Option<AdminError> + Send + Sync,
{
    fn map(&self, err: &(dyn StdError + 'static)) -> Option<AdminError> {
        (self.0)(err)
    }
}

/// Request details attached to presented errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Canonical error payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedError {
    pub code: u16,
    pub text_code: String,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

impl IntoResponse for PresentedError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

fn safe_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Validation => "the request is invalid",
        ErrorCategory::NotFound => "the requested resource was not found",
        ErrorCategory::Conflict => "the request conflicts with the current state",
        ErrorCategory::Forbidden => "permission denied",
        ErrorCategory::Unauthenticated => "authentication required",
        ErrorCategory::FeatureDisabled => "the requested feature is disabled",
        ErrorCategory::ServiceNotConfigured => "the required service is not configured",
        ErrorCategory::RateLimited => "rate limit exceeded",
        ErrorCategory::Internal => "an internal error occurred",
    }
}

fn cause_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut frames = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        frames.push(cause.to_string());
        current = cause.source();
    }
    frames
}

/// Renders errors under the dev or production policy
#[derive(Clone)]
pub struct ErrorPresenter {
    mappers: Vec<Arc<dyn ErrorMapper>>,
    dev_mode: bool,
}

impl std::fmt::Debug for ErrorPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPresenter")
            .field("mappers", &self.mappers.len())
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

impl ErrorPresenter {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            mappers: vec![Arc::new(AdminErrorMapper), Arc::new(JsonErrorMapper)],
            dev_mode,
        }
    }

    pub fn production() -> Self {
        Self::new(false)
    }

    pub fn development() -> Self {
        Self::new(true)
    }

    /// Add a mapper consulted before the built-in ones.
    pub fn with_mapper(mut self, mapper: Arc<dyn ErrorMapper>) -> Self {
        self.mappers.insert(0, mapper);
        self
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Classify a foreign error.
    pub fn classify(&self, err: &(dyn StdError + 'static)) -> AdminError {
        self.mappers
            .iter()
            .find_map(|mapper| mapper.map(err))
            .unwrap_or_else(|| AdminError::internal(err.to_string()))
    }

    /// Classify then present a foreign error.
    pub fn present_error(&self, err: &(dyn StdError + 'static), request: Option<&RequestInfo>) -> PresentedError {
        let classified = self.classify(err);
        let mut presented = self.present(&classified, request);
        if self.dev_mode {
            presented.stack = Some(cause_chain(err));
        }
        presented
    }

    /// Render and log an error.
    pub fn present(&self, err: &AdminError, request: Option<&RequestInfo>) -> PresentedError {
        if err.category() == ErrorCategory::Internal {
            tracing::error!(
                error = %err,
                method = request.map(|r| r.method.as_str()).unwrap_or_default(),
                path = request.map(|r| r.path.as_str()).unwrap_or_default(),
                "Internal error"
            );
        } else {
            tracing::debug!(error = %err, text_code = err.text_code(), "Request failed");
        }
        self.render(err, request)
    }

    /// Render without logging.
    pub fn render(&self, err: &AdminError, request: Option<&RequestInfo>) -> PresentedError {
        let category = err.category();
        let mut metadata = err.metadata();
        let confidential = matches!(category, ErrorCategory::Forbidden | ErrorCategory::Unauthenticated);

        let message = if self.dev_mode {
            err.to_string()
        } else if category == ErrorCategory::Internal || metadata.is_empty() {
            safe_message(category).to_string()
        } else {
            err.root().to_string()
        };

        if let Some(request) = request.filter(|_| !confidential) {
            metadata.insert("request_method".into(), Value::String(request.method.clone()));
            metadata.insert("request_path".into(), Value::String(request.path.clone()));
        }

        PresentedError {
            code: err.http_status(),
            text_code: err.text_code().to_string(),
            category,
            message,
            metadata: (!metadata.is_empty()).then_some(metadata),
            stack: self.dev_mode.then(|| cause_chain(err)),
        }
    }
}

impl Default for ErrorPresenter {
    fn default() -> Self {
        Self::production()
    }
}
