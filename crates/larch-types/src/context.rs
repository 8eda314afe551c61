//! Per-request admin context
//!
//! An [`AdminContext`] is built once at HTTP ingress and passed by value
//! into panels, the workflow runtime and the translation queue. It is never
//! mutated after dispatch; the `with_*` builders return a new value.

use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How the caller wants the response rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Json,
    Html,
    Partial,
}

impl FromStr for RenderMode {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "api" => Ok(RenderMode::Json),
            "html" | "page" => Ok(RenderMode::Html),
            "partial" | "fragment" => Ok(RenderMode::Partial),
            other => Err(AdminError::validation(
                "render_mode",
                format!("unknown render mode: {other}"),
            )),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Json => f.write_str("json"),
            RenderMode::Html => f.write_str("html"),
            RenderMode::Partial => f.write_str("partial"),
        }
    }
}

/// Authenticated identity attached by the authenticator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

/// Request-scoped context
#[derive(Debug, Clone)]
pub struct AdminContext {
    cancel: CancellationToken,
    actor: Option<Actor>,
    locale: String,
    environment: String,
    render_mode: Option<RenderMode>,
    values: Arc<BTreeMap<String, Value>>,
}

impl Default for AdminContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            actor: None,
            locale: String::new(),
            environment: String::new(),
            render_mode: None,
            values: Arc::new(BTreeMap::new()),
        }
    }

    /// Context for background work that acts as the system itself.
    pub fn system() -> Self {
        Self::new().with_actor(Actor::new("system"))
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into().trim().to_string();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into().trim().to_lowercase();
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach a value to the context value store.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value);
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Actor id, or the empty string for anonymous requests
    pub fn user_id(&self) -> &str {
        self.actor.as_ref().map(|a| a.id.as_str()).unwrap_or("")
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn render_mode(&self) -> Option<RenderMode> {
        self.render_mode
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the request has been cancelled.
    pub fn ensure_active(&self) -> AdminResult<()> {
        if self.cancel.is_cancelled() {
            Err(AdminError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn require_actor(&self) -> AdminResult<&Actor> {
        self.actor.as_ref().ok_or(AdminError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders_normalize() {
        let ctx = AdminContext::new()
            .with_locale(" en ")
            .with_environment(" Production ")
            .with_actor(Actor::new("user-1"));
        assert_eq!(ctx.locale(), "en");
        assert_eq!(ctx.environment(), "production");
        assert_eq!(ctx.user_id(), "user-1");
    }

    #[test]
    fn test_values_are_copy_on_write() {
        let base = AdminContext::new().with_value("request_id", json!("r-1"));
        let derived = base.clone().with_value("request_id", json!("r-2"));
        assert_eq!(base.value("request_id"), Some(&json!("r-1")));
        assert_eq!(derived.value("request_id"), Some(&json!("r-2")));
    }

    #[test]
    fn test_cancellation() {
        let ctx = AdminContext::new();
        assert!(ctx.ensure_active().is_ok());
        ctx.cancellation_token().cancel();
        assert!(matches!(ctx.ensure_active(), Err(AdminError::Cancelled)));
    }

    #[test]
    fn test_render_mode_parse() {
        assert_eq!("HTML".parse::<RenderMode>().unwrap(), RenderMode::Html);
        assert!("xml".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_anonymous_requires_actor() {
        let ctx = AdminContext::new();
        assert_eq!(ctx.user_id(), "");
        assert!(matches!(ctx.require_actor(), Err(AdminError::Unauthenticated)));
    }
}
