//! In-memory feature resolvers

use crate::gate::{EnabledOptions, FeatureGate, MutableFeatureGate};
use crate::keys;
use crate::scope::FeatureScope;
use async_trait::async_trait;
use larch_types::{normalize_key, AdminContext, AdminResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

fn normalize_defaults(defaults: HashMap<String, bool>) -> AdminResult<HashMap<String, bool>> {
    let mut normalized = HashMap::with_capacity(defaults.len());
    for (key, value) in defaults {
        keys::check_alias(&key)?;
        normalized.insert(normalize_key(&key), value);
    }
    Ok(normalized)
}

/// Read-only gate backed by configured defaults
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureGate {
    defaults: HashMap<String, bool>,
}

impl StaticFeatureGate {
    /// Fails when a default is seeded under a removed alias.
    pub fn new(defaults: HashMap<String, bool>) -> AdminResult<Self> {
        Ok(Self {
            defaults: normalize_defaults(defaults)?,
        })
    }
}

#[async_trait]
impl FeatureGate for StaticFeatureGate {
    async fn enabled(
        &self,
        ctx: &AdminContext,
        key: &str,
        _options: &EnabledOptions,
    ) -> AdminResult<bool> {
        ctx.ensure_active()?;
        Ok(self.defaults.get(&normalize_key(key)).copied().unwrap_or(false))
    }
}

/// Gate with per-scope overrides layered over configured defaults
#[derive(Debug, Default)]
pub struct ScopedFeatureGate {
    defaults: HashMap<String, bool>,
    overrides: RwLock<HashMap<FeatureScope, HashMap<String, bool>>>,
}

impl ScopedFeatureGate {
    pub fn new(defaults: HashMap<String, bool>) -> AdminResult<Self> {
        Ok(Self {
            defaults: normalize_defaults(defaults)?,
            overrides: RwLock::new(HashMap::new()),
        })
    }

    /// Explicit override at exactly this scope, if any
    pub async fn override_at(&self, key: &str, scope: &FeatureScope) -> Option<bool> {
        let overrides = self.overrides.read().await;
        overrides
            .get(scope)
            .and_then(|values| values.get(&normalize_key(key)))
            .copied()
    }

    pub fn default_for(&self, key: &str) -> bool {
        self.defaults.get(&normalize_key(key)).copied().unwrap_or(false)
    }
}

#[async_trait]
impl FeatureGate for ScopedFeatureGate {
    async fn enabled(
        &self,
        ctx: &AdminContext,
        key: &str,
        options: &EnabledOptions,
    ) -> AdminResult<bool> {
        ctx.ensure_active()?;
        let key = normalize_key(key);
        let chain = options.chain_for(ctx);
        let overrides = self.overrides.read().await;
        for scope in chain.scopes() {
            if let Some(value) = overrides.get(scope).and_then(|values| values.get(&key)) {
                tracing::trace!(feature = %key, scope = %scope, enabled = *value, "Feature resolved by override");
                return Ok(*value);
            }
        }
        Ok(self.defaults.get(&key).copied().unwrap_or(false))
    }

    fn as_mutable(&self) -> Option<&dyn MutableFeatureGate> {
        Some(self)
    }
}

#[async_trait]
impl MutableFeatureGate for ScopedFeatureGate {
    async fn set(
        &self,
        ctx: &AdminContext,
        key: &str,
        scope: &FeatureScope,
        enabled: bool,
    ) -> AdminResult<()> {
        keys::check_alias(key)?;
        ctx.ensure_active()?;
        let key = normalize_key(key);
        let mut overrides = self.overrides.write().await;
        overrides
            .entry(scope.clone())
            .or_default()
            .insert(key.clone(), enabled);
        tracing::info!(feature = %key, scope = %scope, enabled, "Feature override set");
        Ok(())
    }

    async fn unset(&self, ctx: &AdminContext, key: &str, scope: &FeatureScope) -> AdminResult<()> {
        keys::check_alias(key)?;
        ctx.ensure_active()?;
        let key = normalize_key(key);
        let mut overrides = self.overrides.write().await;
        if let Some(values) = overrides.get_mut(scope) {
            values.remove(&key);
            if values.is_empty() {
                overrides.remove(scope);
            }
        }
        tracing::info!(feature = %key, scope = %scope, "Feature override removed");
        Ok(())
    }
}
