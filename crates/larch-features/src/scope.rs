//! Feature scopes

use larch_types::AdminContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope levels, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    User,
    Org,
    Tenant,
    System,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScopeKind::User => "user",
            ScopeKind::Org => "org",
            ScopeKind::Tenant => "tenant",
            ScopeKind::System => "system",
        };
        f.write_str(s)
    }
}

/// A single scope in the chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureScope {
    pub kind: ScopeKind,
    #[serde(default)]
    pub id: String,
}

impl FeatureScope {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::User,
            id: id.into(),
        }
    }

    pub fn org(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Org,
            id: id.into(),
        }
    }

    pub fn tenant(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Tenant,
            id: id.into(),
        }
    }

    pub fn system() -> Self {
        Self {
            kind: ScopeKind::System,
            id: String::new(),
        }
    }
}

impl fmt::Display for FeatureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.id)
        }
    }
}

/// Ordered scopes, resolved from first to last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeChain {
    scopes: Vec<FeatureScope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain derived from the context actor, always ending at system.
    pub fn from_context(ctx: &AdminContext) -> Self {
        let mut chain = Self::new();
        if let Some(actor) = ctx.actor() {
            if !actor.id.is_empty() {
                chain = chain.with(FeatureScope::user(&actor.id));
            }
            if let Some(org) = actor.org_id.as_deref().filter(|v| !v.is_empty()) {
                chain = chain.with(FeatureScope::org(org));
            }
            if let Some(tenant) = actor.tenant_id.as_deref().filter(|v| !v.is_empty()) {
                chain = chain.with(FeatureScope::tenant(tenant));
            }
        }
        chain.with(FeatureScope::system())
    }

    /// Append a scope; the chain is kept ordered from user to system.
    pub fn with(mut self, scope: FeatureScope) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
            self.scopes.sort_by_key(|s| s.kind);
        }
        self
    }

    pub fn scopes(&self) -> &[FeatureScope] {
        &self.scopes
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
