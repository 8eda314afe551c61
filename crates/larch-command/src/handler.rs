//! Handler traits

use async_trait::async_trait;
use larch_types::{AdminContext, AdminResult};
use std::sync::Arc;

/// Handles a command payload of type `T`
#[async_trait]
pub trait CommandHandler<T>: Send + Sync {
    async fn execute(&self, ctx: &AdminContext, payload: T) -> AdminResult<()>;
}

/// Handles a query from `I` to `O`
#[async_trait]
pub trait QueryHandler<I, O>: Send + Sync {
    async fn query(&self, ctx: &AdminContext, input: I) -> AdminResult<O>;
}

#[async_trait]
impl<T, H> CommandHandler<T> for Arc<H>
where
    T: Send + 'static,
    H: CommandHandler<T> + ?Sized,
{
    async fn execute(&self, ctx: &AdminContext, payload: T) -> AdminResult<()> {
        (**self).execute(ctx, payload).await
    }
}

#[async_trait]
impl<I, O, H> QueryHandler<I, O> for Arc<H>
where
    I: Send + 'static,
    O: Send + 'static,
    H: QueryHandler<I, O> + ?Sized,
{
    async fn query(&self, ctx: &AdminContext, input: I) -> AdminResult<O> {
        (**self).query(ctx, input).await
    }
}
