//! Feature gate traits

use crate::keys;
use crate::scope::{FeatureScope, ScopeChain};
use async_trait::async_trait;
use larch_types::{AdminContext, AdminError, AdminResult};

/// Options for a single resolution
#[derive(Debug, Clone, Default)]
pub struct EnabledOptions {
    /// Explicit scope chain; derived from the context actor when absent
    pub scope_chain: Option<ScopeChain>,
}

impl EnabledOptions {
    pub fn with_scope_chain(chain: ScopeChain) -> Self {
        Self {
            scope_chain: Some(chain),
        }
    }

    pub(crate) fn chain_for(&self, ctx: &AdminContext) -> ScopeChain {
        self.scope_chain
            .clone()
            .unwrap_or_else(|| ScopeChain::from_context(ctx))
    }
}

/// Read side of the feature gate
#[async_trait]
pub trait FeatureGate: Send + Sync {
    /// Resolve `key` for the given scope chain.
    async fn enabled(
        &self,
        ctx: &AdminContext,
        key: &str,
        options: &EnabledOptions,
    ) -> AdminResult<bool>;

    /// Write capability, when the resolver supports overrides
    fn as_mutable(&self) -> Option<&dyn MutableFeatureGate> {
        None
    }
}

/// Override mutation capability
#[async_trait]
pub trait MutableFeatureGate: Send + Sync {
    async fn set(
        &self,
        ctx: &AdminContext,
        key: &str,
        scope: &FeatureScope,
        enabled: bool,
    ) -> AdminResult<()>;

    async fn unset(&self, ctx: &AdminContext, key: &str, scope: &FeatureScope) -> AdminResult<()>;
}

/// Resolve a key with the context-derived scope chain.
pub async fn is_enabled(gate: &dyn FeatureGate, ctx: &AdminContext, key: &str) -> AdminResult<bool> {
    gate.enabled(ctx, key, &EnabledOptions::default()).await
}

/// Fail with `FEATURE_DISABLED` unless `key` resolves to true.
pub async fn require_feature(gate: &dyn FeatureGate, ctx: &AdminContext, key: &str) -> AdminResult<()> {
    if is_enabled(gate, ctx, key).await? {
        Ok(())
    } else {
        Err(AdminError::feature_disabled(key))
    }
}

pub async fn set_override(
    gate: &dyn FeatureGate,
    ctx: &AdminContext,
    key: &str,
    scope: &FeatureScope,
    enabled: bool,
) -> AdminResult<()> {
    keys::check_alias(key)?;
    match gate.as_mutable() {
        Some(mutable) => mutable.set(ctx, key, scope, enabled).await,
        None => Err(AdminError::unsupported("feature gate", "set")),
    }
}

pub async fn unset_override(
    gate: &dyn FeatureGate,
    ctx: &AdminContext,
    key: &str,
    scope: &FeatureScope,
) -> AdminResult<()> {
    keys::check_alias(key)?;
    match gate.as_mutable() {
        Some(mutable) => mutable.unset(ctx, key, scope).await,
        None => Err(AdminError::unsupported("feature gate", "unset")),
    }
}
