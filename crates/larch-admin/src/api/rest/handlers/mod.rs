//! API request handlers

mod commands;
mod dashboard;
mod features;
mod health;
mod navigation;
mod panels;
mod translations;
mod workflows;

pub use commands::*;
pub use dashboard::*;
pub use features::*;
pub use health::*;
pub use navigation::*;
pub use panels::*;
pub use translations::*;
pub use workflows::*;

use super::state::AppState;
use crate::error::ApiResult;
use larch_types::{AdminContext, AdminError};

/// Features that are off answer 404.
pub(crate) async fn ensure_feature(state: &AppState, ctx: &AdminContext, key: &str) -> ApiResult<()> {
    larch_features::require_feature(state.admin.features().as_ref(), ctx, key).await?;
    Ok(())
}

/// Denied permissions answer 403; an empty permission is public.
pub(crate) async fn ensure_permission(
    state: &AppState,
    ctx: &AdminContext,
    permission: &str,
    resource: &str,
) -> ApiResult<()> {
    if permission.is_empty() || state.admin.authorizer().can(ctx, permission, resource).await {
        Ok(())
    } else {
        Err(AdminError::forbidden(permission, resource).into())
    }
}
