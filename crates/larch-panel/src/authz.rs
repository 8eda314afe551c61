//! Authorization oracle

use async_trait::async_trait;
use larch_types::AdminContext;
use std::collections::HashSet;

/// Answers `can(action, resource)` for the request's actor
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can(&self, ctx: &AdminContext, action: &str, resource: &str) -> bool;
}

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn can(&self, _ctx: &AdminContext, _action: &str, _resource: &str) -> bool {
        true
    }
}

/// Grants a fixed set of permission strings, regardless of resource
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    granted: HashSet<String>,
}

impl StaticAuthorizer {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn can(&self, _ctx: &AdminContext, action: &str, _resource: &str) -> bool {
        self.granted.contains(action)
    }
}
