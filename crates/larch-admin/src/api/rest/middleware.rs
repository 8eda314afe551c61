//! Authentication and error presentation layers

use super::state::AppState;
use crate::error::{ApiError, UnpresentedError};
use crate::presenter::RequestInfo;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Run the configured authenticator and leave the actor in the extensions.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    match state.admin.authenticator().authenticate(&parts).await {
        Ok(Some(actor)) => {
            tracing::trace!(user_id = %actor.id, "Request authenticated");
            parts.extensions.insert(actor);
        }
        Ok(None) => {}
        Err(err) => return ApiError(err).into_response(),
    }
    next.run(Request::from_parts(parts, body)).await
}

/// Re-render handler errors with the configured policy and request details.
pub async fn present_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let info = RequestInfo::new(request.method().as_str(), request.uri().path());
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<UnpresentedError>() {
        Some(UnpresentedError(err)) => state.admin.presenter().present(&err, Some(&info)).into_response(),
        None => response,
    }
}
