//! Larch Types - foundation for the administrative backoffice
//!
//! Every other Larch crate speaks in these types:
//!
//! - [`AdminError`]: the unified error taxonomy. Each variant knows its
//!   [`ErrorCategory`], stable text code, HTTP status and metadata.
//! - [`AdminContext`]: per-request value carrying cancellation, actor,
//!   locale, environment and render mode.
//! - [`Record`]: the opaque, JSON-compatible row that panels and
//!   repositories exchange.
//! - [`Versioned`] / [`next_version`]: the optimistic concurrency contract
//!   shared by workflows, bindings and translation assignments.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod context;
pub mod error;
pub mod record;
pub mod version;

pub use context::{Actor, AdminContext, RenderMode};
pub use error::{AdminError, AdminResult, ErrorCategory};
pub use record::{record_from, record_into, Record, RecordExt};
pub use version::{apply_expected_version, next_version, VersionMismatch, Versioned};

/// Normalize an identifier-like string: trimmed and lowercased.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trim a string and map the empty result to `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Editorial "), "editorial");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" prod ")), Some("prod".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
