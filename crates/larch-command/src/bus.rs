//! Command bus
//!
//! Typed handlers live in `TypeId`-keyed tables holding type-erased
//! `Arc<dyn CommandHandler<T>>` values. Named routes carry the payload type
//! and look the typed handler up at dispatch time, so a route may be bound
//! before or after its handler is registered.

use crate::handler::{CommandHandler, QueryHandler};
use async_trait::async_trait;
use larch_types::{AdminContext, AdminError, AdminResult, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;

type Erased = Arc<dyn Any + Send + Sync>;

#[async_trait]
trait NamedRoute: Send + Sync {
    async fn dispatch(
        &self,
        bus: &CommandBus,
        ctx: &AdminContext,
        name: &str,
        payload: Record,
    ) -> AdminResult<Option<Value>>;
}

struct CommandRoute<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T> NamedRoute for CommandRoute<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn dispatch(
        &self,
        bus: &CommandBus,
        ctx: &AdminContext,
        name: &str,
        payload: Record,
    ) -> AdminResult<Option<Value>> {
        let handler = bus.command_handler::<T>(name).await?;
        let payload: T = serde_json::from_value(Value::Object(payload))?;
        handler
            .execute(ctx, payload)
            .await
            .map_err(|e| e.in_command(name))?;
        Ok(None)
    }
}

struct QueryRoute<I, O>(PhantomData<fn(I) -> O>);

#[async_trait]
impl<I, O> NamedRoute for QueryRoute<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    async fn dispatch(
        &self,
        bus: &CommandBus,
        ctx: &AdminContext,
        name: &str,
        payload: Record,
    ) -> AdminResult<Option<Value>> {
        let handler = bus.query_handler::<I, O>(name).await?;
        let input: I = serde_json::from_value(Value::Object(payload))?;
        let output = handler
            .query(ctx, input)
            .await
            .map_err(|e| e.in_command(name))?;
        let value = serde_json::to_value(output)
            .map_err(|e| AdminError::internal(format!("serialize {name} result: {e}")))?;
        Ok(Some(value))
    }
}

#[derive(Default)]
struct Tables {
    commands: HashMap<TypeId, Erased>,
    queries: HashMap<(TypeId, TypeId), Erased>,
    routes: HashMap<String, Arc<dyn NamedRoute>>,
}

/// Dispatcher for typed and name-addressed commands
#[derive(Default)]
pub struct CommandBus {
    tables: RwLock<Tables>,
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus").finish_non_exhaustive()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for command type `T`.
    ///
    /// A second registration for the same type is rejected.
    pub async fn register_command<T, H>(&self, handler: H) -> AdminResult<()>
    where
        T: Send + 'static,
        H: CommandHandler<T> + 'static,
    {
        self.insert_command::<T>(Arc::new(handler), false).await
    }

    /// Register the handler for `T`, replacing any existing one.
    pub async fn override_command<T, H>(&self, handler: H) -> AdminResult<()>
    where
        T: Send + 'static,
        H: CommandHandler<T> + 'static,
    {
        self.insert_command::<T>(Arc::new(handler), true).await
    }

    pub async fn register_query<I, O, H>(&self, handler: H) -> AdminResult<()>
    where
        I: Send + 'static,
        O: Send + 'static,
        H: QueryHandler<I, O> + 'static,
    {
        self.insert_query::<I, O>(Arc::new(handler), false).await
    }

    pub async fn override_query<I, O, H>(&self, handler: H) -> AdminResult<()>
    where
        I: Send + 'static,
        O: Send + 'static,
        H: QueryHandler<I, O> + 'static,
    {
        self.insert_query::<I, O>(Arc::new(handler), true).await
    }

    /// Make the command handler for `T` reachable under `name`.
    pub async fn bind_command<T>(&self, name: &str) -> AdminResult<()>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.insert_route(name, Arc::new(CommandRoute::<T>(PhantomData)), false)
            .await
    }

    pub async fn bind_query<I, O>(&self, name: &str) -> AdminResult<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.insert_route(name, Arc::new(QueryRoute::<I, O>(PhantomData)), false)
            .await
    }

    /// Rebind `name`, replacing an existing route.
    pub async fn rebind_command<T>(&self, name: &str) -> AdminResult<()>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.insert_route(name, Arc::new(CommandRoute::<T>(PhantomData)), true)
            .await
    }

    pub async fn rebind_query<I, O>(&self, name: &str) -> AdminResult<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.insert_route(name, Arc::new(QueryRoute::<I, O>(PhantomData)), true)
            .await
    }

    /// Register a command handler and bind it to `name` in one step.
    pub async fn register_named_command<T, H>(&self, name: &str, handler: H) -> AdminResult<()>
    where
        T: DeserializeOwned + Send + 'static,
        H: CommandHandler<T> + 'static,
    {
        self.register_command::<T, H>(handler).await?;
        self.bind_command::<T>(name).await
    }

    pub async fn register_named_query<I, O, H>(&self, name: &str, handler: H) -> AdminResult<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        H: QueryHandler<I, O> + 'static,
    {
        self.register_query::<I, O, H>(handler).await?;
        self.bind_query::<I, O>(name).await
    }

    /// Dispatch a typed command.
    pub async fn dispatch<T>(&self, ctx: &AdminContext, payload: T) -> AdminResult<()>
    where
        T: Send + 'static,
    {
        ctx.ensure_active()?;
        let name = type_name::<T>();
        let handler = self.command_handler::<T>(name).await?;
        tracing::debug!(command = name, "Dispatching command");
        handler
            .execute(ctx, payload)
            .await
            .map_err(|e| e.in_command(name))
    }

    /// Run a typed query.
    pub async fn query<I, O>(&self, ctx: &AdminContext, input: I) -> AdminResult<O>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        ctx.ensure_active()?;
        let name = type_name::<I>();
        let handler = self.query_handler::<I, O>(name).await?;
        tracing::debug!(query = name, "Dispatching query");
        handler
            .query(ctx, input)
            .await
            .map_err(|e| e.in_command(name))
    }

    /// Dispatch by registered name.
    ///
    /// Commands yield `None`; queries yield their serialized output.
    pub async fn dispatch_by_name(
        &self,
        ctx: &AdminContext,
        name: &str,
        payload: Record,
    ) -> AdminResult<Option<Value>> {
        ctx.ensure_active()?;
        let route = {
            let tables = self.tables.read().await;
            tables.routes.get(name).cloned()
        };
        let route = route.ok_or_else(|| AdminError::not_found("command", name))?;
        tracing::debug!(command = name, "Dispatching command by name");
        route.dispatch(self, ctx, name, payload).await
    }

    /// Dispatch by name and decode the result into `result` when one is produced.
    pub async fn dispatch_by_name_into<R>(
        &self,
        ctx: &AdminContext,
        name: &str,
        payload: Record,
        result: &mut Option<R>,
    ) -> AdminResult<()>
    where
        R: DeserializeOwned,
    {
        if let Some(value) = self.dispatch_by_name(ctx, name, payload).await? {
            let decoded = serde_json::from_value(value)
                .map_err(|e| AdminError::internal(format!("decode {name} result: {e}")))?;
            *result = Some(decoded);
        }
        Ok(())
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.routes.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has_name(&self, name: &str) -> bool {
        self.tables.read().await.routes.contains_key(name)
    }

    async fn insert_command<T>(&self, handler: Arc<dyn CommandHandler<T>>, replace: bool) -> AdminResult<()>
    where
        T: Send + 'static,
    {
        let mut tables = self.tables.write().await;
        let key = TypeId::of::<T>();
        if !replace && tables.commands.contains_key(&key) {
            return Err(AdminError::already_exists("command handler", type_name::<T>()));
        }
        tables.commands.insert(key, Arc::new(handler));
        Ok(())
    }

    async fn insert_query<I, O>(&self, handler: Arc<dyn QueryHandler<I, O>>, replace: bool) -> AdminResult<()>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let mut tables = self.tables.write().await;
        let key = (TypeId::of::<I>(), TypeId::of::<O>());
        if !replace && tables.queries.contains_key(&key) {
            return Err(AdminError::already_exists("query handler", type_name::<I>()));
        }
        tables.queries.insert(key, Arc::new(handler));
        Ok(())
    }

    async fn insert_route(&self, name: &str, route: Arc<dyn NamedRoute>, replace: bool) -> AdminResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdminError::validation("name", "command name is required"));
        }
        let mut tables = self.tables.write().await;
        if !replace && tables.routes.contains_key(name) {
            return Err(AdminError::already_exists("command", name));
        }
        tables.routes.insert(name.to_string(), route);
        Ok(())
    }

    async fn command_handler<T>(&self, name: &str) -> AdminResult<Arc<dyn CommandHandler<T>>>
    where
        T: Send + 'static,
    {
        let tables = self.tables.read().await;
        tables
            .commands
            .get(&TypeId::of::<T>())
            .and_then(|erased| erased.downcast_ref::<Arc<dyn CommandHandler<T>>>())
            .cloned()
            .ok_or_else(|| AdminError::not_found("command", name))
    }

    async fn query_handler<I, O>(&self, name: &str) -> AdminResult<Arc<dyn QueryHandler<I, O>>>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let tables = self.tables.read().await;
        tables
            .queries
            .get(&(TypeId::of::<I>(), TypeId::of::<O>()))
            .and_then(|erased| erased.downcast_ref::<Arc<dyn QueryHandler<I, O>>>())
            .cloned()
            .ok_or_else(|| AdminError::not_found("command", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Deserialize)]
    struct Bump {
        by: u64,
    }

    #[derive(Default)]
    struct Counter {
        value: AtomicU64,
    }

    #[async_trait]
    impl CommandHandler<Bump> for Counter {
        async fn execute(&self, _ctx: &AdminContext, payload: Bump) -> AdminResult<()> {
            if payload.by == 0 {
                return Err(AdminError::validation("by", "must be positive"));
            }
            self.value.fetch_add(payload.by, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        text: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Echoed {
        text: String,
        length: usize,
    }

    struct EchoHandler;

    #[async_trait]
    impl QueryHandler<Echo, Echoed> for EchoHandler {
        async fn query(&self, _ctx: &AdminContext, input: Echo) -> AdminResult<Echoed> {
            Ok(Echoed {
                length: input.text.len(),
                text: input.text,
            })
        }
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[tokio::test]
    async fn test_typed_and_named_dispatch_share_handler() {
        let bus = CommandBus::new();
        let counter = Arc::new(Counter::default());
        bus.register_named_command::<Bump, _>("counter.bump", counter.clone())
            .await
            .unwrap();

        let ctx = AdminContext::new();
        bus.dispatch(&ctx, Bump { by: 2 }).await.unwrap();
        let out = bus
            .dispatch_by_name(&ctx, "counter.bump", record(json!({ "by": 3 })))
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(counter.value.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected_unless_override() {
        let bus = CommandBus::new();
        bus.register_command::<Bump, _>(Counter::default()).await.unwrap();
        let err = bus
            .register_command::<Bump, _>(Counter::default())
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        bus.override_command::<Bump, _>(Counter::default()).await.unwrap();

        bus.bind_command::<Bump>("counter.bump").await.unwrap();
        assert!(bus.bind_command::<Bump>("counter.bump").await.is_err());
        bus.rebind_command::<Bump>("counter.bump").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_result_populated_by_name() {
        let bus = CommandBus::new();
        bus.register_named_query::<Echo, Echoed, _>("echo", EchoHandler)
            .await
            .unwrap();
        let ctx = AdminContext::new();

        let typed: Echoed = bus.query(&ctx, Echo { text: "hi".into() }).await.unwrap();
        let mut named: Option<Echoed> = None;
        bus.dispatch_by_name_into(&ctx, "echo", record(json!({ "text": "hi" })), &mut named)
            .await
            .unwrap();
        assert_eq!(named, Some(typed));
    }

    #[tokio::test]
    async fn test_missing_handler_is_not_found() {
        let bus = CommandBus::new();
        let ctx = AdminContext::new();
        let err = bus
            .dispatch_by_name(&ctx, "nope", Record::new())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);

        // Bound name without a handler
        bus.bind_command::<Bump>("counter.bump").await.unwrap();
        let err = bus
            .dispatch_by_name(&ctx, "counter.bump", record(json!({ "by": 1 })))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_handler_error_carries_command_frame() {
        let bus = CommandBus::new();
        bus.register_named_command::<Bump, _>("counter.bump", Counter::default())
            .await
            .unwrap();
        let err = bus
            .dispatch_by_name(&AdminContext::new(), "counter.bump", record(json!({ "by": 0 })))
            .await
            .unwrap_err();
        assert_eq!(err.text_code(), "VALIDATION_ERROR");
        assert_eq!(err.metadata()["command"], "counter.bump");
        assert_eq!(err.metadata()["field"], "by");
    }

    #[tokio::test]
    async fn test_bad_payload_is_validation_error() {
        let bus = CommandBus::new();
        bus.register_named_command::<Bump, _>("counter.bump", Counter::default())
            .await
            .unwrap();
        let err = bus
            .dispatch_by_name(&AdminContext::new(), "counter.bump", record(json!({ "by": "x" })))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_names_sorted_and_cancellation() {
        let bus = CommandBus::new();
        bus.bind_command::<Bump>("b.cmd").await.unwrap();
        bus.bind_query::<Echo, Echoed>("a.query").await.unwrap();
        assert_eq!(bus.names().await, vec!["a.query", "b.cmd"]);

        let ctx = AdminContext::new();
        ctx.cancellation_token().cancel();
        let err = bus.dispatch_by_name(&ctx, "a.query", Record::new()).await.unwrap_err();
        assert!(matches!(err, AdminError::Cancelled));
    }
}
