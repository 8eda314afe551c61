//! Well-known feature keys
//!
//! Removed aliases are kept in a deny-list with a remediation hint so that
//! callers toggling an old key get `FEATURE_ALIAS_DISABLED` instead of a
//! silent no-op.

use larch_types::{normalize_key, AdminError, AdminResult};

pub const DASHBOARD: &str = "dashboard";
pub const CMS: &str = "cms";
pub const COMMANDS: &str = "commands";
pub const SETTINGS: &str = "settings";
pub const SEARCH: &str = "search";
pub const NOTIFICATIONS: &str = "notifications";
pub const JOBS: &str = "jobs";
pub const MEDIA: &str = "media";
pub const EXPORT: &str = "export";
pub const BULK: &str = "bulk";
pub const PREFERENCES: &str = "preferences";
pub const WORKFLOWS: &str = "workflows";
pub const TRANSLATION_QUEUE: &str = "translation_queue";
pub const DEBUG: &str = "debug";
pub const TENANTS: &str = "tenants";
pub const ORGANIZATIONS: &str = "organizations";

/// A feature key that no longer exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedAlias {
    pub alias: &'static str,
    pub replacement: &'static str,
    pub hint: &'static str,
}

pub const REMOVED_ALIASES: &[RemovedAlias] = &[
    RemovedAlias {
        alias: "cms.workflows",
        replacement: WORKFLOWS,
        hint: "rename feature_flags.cms.workflows to feature_flags.workflows",
    },
    RemovedAlias {
        alias: "translations",
        replacement: TRANSLATION_QUEUE,
        hint: "the translation workflow queue is gated by translation_queue",
    },
    RemovedAlias {
        alias: "translation.queue",
        replacement: TRANSLATION_QUEUE,
        hint: "the translation workflow queue is gated by translation_queue",
    },
    RemovedAlias {
        alias: "commands.repl",
        replacement: DEBUG,
        hint: "the REPL shell is part of the debug subsystem",
    },
    RemovedAlias {
        alias: "user_preferences",
        replacement: PREFERENCES,
        hint: "rename feature_flags.user_preferences to feature_flags.preferences",
    },
];

pub fn removed_alias(key: &str) -> Option<&'static RemovedAlias> {
    let key = normalize_key(key);
    REMOVED_ALIASES.iter().find(|a| a.alias == key)
}

/// Reject removed alias keys.
pub fn check_alias(key: &str) -> AdminResult<()> {
    match removed_alias(key) {
        Some(alias) => Err(AdminError::FeatureAliasDisabled {
            alias: alias.alias.to_string(),
            replacement: alias.replacement.to_string(),
            hint: alias.hint.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_rejected_with_hint() {
        let err = check_alias(" Translations ").unwrap_err();
        assert_eq!(err.text_code(), "FEATURE_ALIAS_DISABLED");
        assert_eq!(err.metadata()["replacement"], "translation_queue");
    }

    #[test]
    fn test_current_keys_pass() {
        assert!(check_alias(TRANSLATION_QUEUE).is_ok());
        assert!(check_alias(COMMANDS).is_ok());
    }
}
