//! Panel lifecycle hooks
//!
//! Every method defaults to a no-op. An error from a hook aborts the
//! operation and is returned unchanged.

use async_trait::async_trait;
use larch_types::{AdminContext, AdminResult, Record};

#[async_trait]
pub trait PanelHooks: Send + Sync {
    async fn before_create(&self, _ctx: &AdminContext, _record: &mut Record) -> AdminResult<()> {
        Ok(())
    }

    async fn after_create(&self, _ctx: &AdminContext, _record: &Record) -> AdminResult<()> {
        Ok(())
    }

    async fn before_update(&self, _ctx: &AdminContext, _id: &str, _record: &mut Record) -> AdminResult<()> {
        Ok(())
    }

    async fn after_update(&self, _ctx: &AdminContext, _record: &Record) -> AdminResult<()> {
        Ok(())
    }

    async fn before_delete(&self, _ctx: &AdminContext, _id: &str) -> AdminResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _ctx: &AdminContext, _id: &str) -> AdminResult<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl PanelHooks for NoHooks {}
