//! Larch Feature Gate
//!
//! Resolves boolean feature keys across a scope chain. Scopes are walked
//! from the most specific (user) to the least specific (system); the first
//! explicit override wins and the configured default applies otherwise.
//!
//! - [`FeatureGate`]: read side, `enabled(ctx, key, options)`
//! - [`MutableFeatureGate`]: optional write side for overrides
//! - [`ScopedFeatureGate`]: in-memory resolver with overrides
//! - [`StaticFeatureGate`]: read-only resolver seeded from configuration
//! - [`keys`]: well-known keys and the removed-alias deny-list

#![deny(unsafe_code)]

pub mod gate;
pub mod keys;
pub mod memory;
pub mod scope;

pub use gate::{is_enabled, require_feature, set_override, unset_override, EnabledOptions, FeatureGate, MutableFeatureGate};
pub use keys::{check_alias, RemovedAlias};
pub use memory::{ScopedFeatureGate, StaticFeatureGate};
pub use scope::{FeatureScope, ScopeChain, ScopeKind};
