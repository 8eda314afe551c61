//! Unified error taxonomy
//!
//! Every failure that can reach the HTTP boundary is an [`AdminError`].
//! Variants carry the structured data callers need (versions, conflicting
//! ids, missing locales); [`AdminError::metadata`] exposes it as a JSON map
//! so the presenter never has to parse messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Error categories recognised by the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Unauthenticated,
    FeatureDisabled,
    ServiceNotConfigured,
    RateLimited,
    Internal,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Validation,
        ErrorCategory::NotFound,
        ErrorCategory::Conflict,
        ErrorCategory::Forbidden,
        ErrorCategory::Unauthenticated,
        ErrorCategory::FeatureDisabled,
        ErrorCategory::ServiceNotConfigured,
        ErrorCategory::RateLimited,
        ErrorCategory::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not-found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Forbidden => "forbidden",
            ErrorCategory::Unauthenticated => "unauthenticated",
            ErrorCategory::FeatureDisabled => "feature-disabled",
            ErrorCategory::ServiceNotConfigured => "service-not-configured",
            ErrorCategory::RateLimited => "rate-limited",
            ErrorCategory::Internal => "internal",
        }
    }

    /// Default HTTP status for the category.
    ///
    /// `feature-disabled` maps to 404 so that disabled features stay
    /// invisible; authenticated admin surfaces may present it as 403.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::Unauthenticated => 401,
            ErrorCategory::FeatureDisabled => 404,
            ErrorCategory::ServiceNotConfigured => 503,
            ErrorCategory::RateLimited => 429,
            ErrorCategory::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced anywhere in the admin core
#[derive(Debug, Clone, Error)]
pub enum AdminError {
    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("{resource} already exists: {id}")]
    AlreadyExists { resource: String, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(
        "workflow {workflow_id} version conflict: expected {expected_version}, actual {actual_version}"
    )]
    WorkflowVersionConflict {
        workflow_id: String,
        expected_version: u64,
        actual_version: u64,
    },

    #[error(
        "binding {binding_id} version conflict: expected {expected_version}, actual {actual_version}"
    )]
    BindingVersionConflict {
        binding_id: String,
        expected_version: u64,
        actual_version: u64,
    },

    #[error("active binding {existing_binding_id} already covers {scope_type}/{scope_ref} at priority {priority}")]
    BindingConflict {
        existing_binding_id: String,
        scope_type: String,
        scope_ref: String,
        environment: Option<String>,
        priority: u32,
    },

    #[error(
        "assignment {assignment_id} version conflict: expected {expected_version}, actual {actual_version}"
    )]
    AssignmentVersionConflict {
        assignment_id: String,
        expected_version: u64,
        actual_version: u64,
    },

    #[error("active assignment {existing_assignment_id} already covers {uniqueness_key}")]
    AssignmentActiveConflict {
        existing_assignment_id: String,
        uniqueness_key: String,
    },

    #[error("workflow {workflow_id} has no revision {version}")]
    RollbackVersionNotFound { workflow_id: String, version: u64 },

    #[error("no workflow registered for {0}")]
    WorkflowNotFound(String),

    #[error("transition {transition} is not available from {from_state} for {entity_type}")]
    InvalidTransition {
        entity_type: String,
        from_state: String,
        transition: String,
    },

    #[error("transition {transition} on {entity_type}/{entity_id} is blocked by missing translations: {}", .missing_locales.join(", "))]
    MissingTranslations {
        entity_type: String,
        entity_id: String,
        transition: String,
        environment: String,
        requested_locale: String,
        missing_locales: Vec<String>,
    },

    #[error("permission denied for {action} on {resource}")]
    Forbidden { action: String, resource: String },

    #[error("authentication required")]
    Unauthenticated,

    #[error("feature disabled: {feature}")]
    FeatureDisabled {
        feature: String,
        reason: Option<String>,
    },

    #[error("feature key {alias} has been removed, use {replacement}")]
    FeatureAliasDisabled {
        alias: String,
        replacement: String,
        hint: String,
    },

    #[error("{0} is not configured")]
    ServiceNotConfigured(String),

    #[error("{resource} does not support {operation}")]
    Unsupported { resource: String, operation: String },

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("command {command} failed: {source}")]
    Command {
        command: String,
        source: Box<AdminError>,
    },
}

/// Result type alias for admin operations
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AdminError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        AdminError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>, id: impl Into<String>) -> Self {
        AdminError::AlreadyExists {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn forbidden(action: impl Into<String>, resource: impl Into<String>) -> Self {
        AdminError::Forbidden {
            action: action.into(),
            resource: resource.into(),
        }
    }

    pub fn feature_disabled(feature: impl Into<String>) -> Self {
        AdminError::FeatureDisabled {
            feature: feature.into(),
            reason: None,
        }
    }

    pub fn unsupported(resource: impl Into<String>, operation: impl Into<String>) -> Self {
        AdminError::Unsupported {
            resource: resource.into(),
            operation: operation.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AdminError::Internal(message.into())
    }

    /// Wrap an error with the name of the command that produced it.
    pub fn in_command(self, command: impl Into<String>) -> Self {
        AdminError::Command {
            command: command.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping command frames.
    pub fn root(&self) -> &AdminError {
        match self {
            AdminError::Command { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AdminError::Validation { .. } => ErrorCategory::Validation,
            AdminError::NotFound { .. }
            | AdminError::WorkflowNotFound(_)
            | AdminError::RollbackVersionNotFound { .. } => ErrorCategory::NotFound,
            AdminError::AlreadyExists { .. }
            | AdminError::Conflict(_)
            | AdminError::WorkflowVersionConflict { .. }
            | AdminError::BindingVersionConflict { .. }
            | AdminError::BindingConflict { .. }
            | AdminError::AssignmentVersionConflict { .. }
            | AdminError::AssignmentActiveConflict { .. }
            | AdminError::InvalidTransition { .. }
            | AdminError::MissingTranslations { .. } => ErrorCategory::Conflict,
            AdminError::Forbidden { .. } => ErrorCategory::Forbidden,
            AdminError::Unauthenticated => ErrorCategory::Unauthenticated,
            AdminError::FeatureDisabled { .. } => ErrorCategory::FeatureDisabled,
            AdminError::FeatureAliasDisabled { .. } => ErrorCategory::Validation,
            AdminError::ServiceNotConfigured(_) | AdminError::Unsupported { .. } => {
                ErrorCategory::ServiceNotConfigured
            }
            AdminError::RateLimited(_) => ErrorCategory::RateLimited,
            AdminError::Cancelled | AdminError::Internal(_) => ErrorCategory::Internal,
            AdminError::Command { source, .. } => source.category(),
        }
    }

    /// Stable machine-readable code
    pub fn text_code(&self) -> &'static str {
        match self {
            AdminError::Validation { .. } => "VALIDATION_ERROR",
            AdminError::NotFound { .. } => "NOT_FOUND",
            AdminError::AlreadyExists { .. } => "ALREADY_EXISTS",
            AdminError::Conflict(_) => "CONFLICT",
            AdminError::WorkflowVersionConflict { .. } => "WORKFLOW_VERSION_CONFLICT",
            AdminError::BindingVersionConflict { .. } => "BINDING_VERSION_CONFLICT",
            AdminError::BindingConflict { .. } => "BINDING_CONFLICT",
            AdminError::AssignmentVersionConflict { .. } => "ASSIGNMENT_VERSION_CONFLICT",
            AdminError::AssignmentActiveConflict { .. } => "ASSIGNMENT_ACTIVE_CONFLICT",
            AdminError::RollbackVersionNotFound { .. } => "ROLLBACK_VERSION_NOT_FOUND",
            AdminError::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            AdminError::InvalidTransition { .. } => "WORKFLOW_INVALID_TRANSITION",
            AdminError::MissingTranslations { .. } => "TRANSLATION_MISSING",
            AdminError::Forbidden { .. } => "FORBIDDEN",
            AdminError::Unauthenticated => "UNAUTHENTICATED",
            AdminError::FeatureDisabled { .. } => "FEATURE_DISABLED",
            AdminError::FeatureAliasDisabled { .. } => "FEATURE_ALIAS_DISABLED",
            AdminError::ServiceNotConfigured(_) => "SERVICE_NOT_CONFIGURED",
            AdminError::Unsupported { .. } => "UNSUPPORTED_OPERATION",
            AdminError::RateLimited(_) => "RATE_LIMITED",
            AdminError::Cancelled => "CANCELLED",
            AdminError::Internal(_) => "INTERNAL_ERROR",
            AdminError::Command { source, .. } => source.text_code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }

    /// Structured metadata for the error.
    ///
    /// Forbidden and unauthenticated errors never carry metadata.
    pub fn metadata(&self) -> Map<String, Value> {
        let value = match self {
            AdminError::Validation { field, message } => {
                json!({ "field": field, "constraint": message })
            }
            AdminError::NotFound { resource, id } | AdminError::AlreadyExists { resource, id } => {
                json!({ "resource": resource, "id": id })
            }
            AdminError::WorkflowVersionConflict {
                workflow_id,
                expected_version,
                actual_version,
            } => json!({
                "workflow_id": workflow_id,
                "expected_version": expected_version,
                "actual_version": actual_version,
            }),
            AdminError::BindingVersionConflict {
                binding_id,
                expected_version,
                actual_version,
            } => json!({
                "binding_id": binding_id,
                "expected_version": expected_version,
                "actual_version": actual_version,
            }),
            AdminError::BindingConflict {
                existing_binding_id,
                scope_type,
                scope_ref,
                environment,
                priority,
            } => json!({
                "existing_binding_id": existing_binding_id,
                "scope_type": scope_type,
                "scope_ref": scope_ref,
                "environment": environment.clone().unwrap_or_default(),
                "priority": priority,
            }),
            AdminError::AssignmentVersionConflict {
                assignment_id,
                expected_version,
                actual_version,
            } => json!({
                "assignment_id": assignment_id,
                "expected_version": expected_version,
                "actual_version": actual_version,
            }),
            AdminError::AssignmentActiveConflict {
                existing_assignment_id,
                uniqueness_key,
            } => json!({
                "existing_assignment_id": existing_assignment_id,
                "uniqueness_key": uniqueness_key,
            }),
            AdminError::RollbackVersionNotFound {
                workflow_id,
                version,
            } => json!({ "workflow_id": workflow_id, "version": version }),
            AdminError::WorkflowNotFound(entity_type) => json!({ "entity_type": entity_type }),
            AdminError::InvalidTransition {
                entity_type,
                from_state,
                transition,
            } => json!({
                "entity_type": entity_type,
                "from_state": from_state,
                "transition": transition,
            }),
            AdminError::MissingTranslations {
                entity_type,
                entity_id,
                transition,
                environment,
                requested_locale,
                missing_locales,
            } => json!({
                "entity_type": entity_type,
                "entity_id": entity_id,
                "transition": transition,
                "environment": environment,
                "requested_locale": requested_locale,
                "missing_locales": missing_locales,
            }),
            AdminError::FeatureDisabled { feature, reason } => match reason {
                Some(reason) => json!({ "feature": feature, "reason": reason }),
                None => json!({ "feature": feature }),
            },
            AdminError::FeatureAliasDisabled {
                alias,
                replacement,
                hint,
            } => json!({ "alias": alias, "replacement": replacement, "hint": hint }),
            AdminError::ServiceNotConfigured(service) => json!({ "service": service }),
            AdminError::Unsupported {
                resource,
                operation,
            } => json!({ "resource": resource, "operation": operation }),
            AdminError::Command { command, source } => {
                let mut metadata = source.metadata();
                if matches!(
                    source.category(),
                    ErrorCategory::Forbidden | ErrorCategory::Unauthenticated
                ) {
                    return metadata;
                }
                metadata.insert("command".to_string(), Value::String(command.clone()));
                return metadata;
            }
            AdminError::Conflict(_)
            | AdminError::Forbidden { .. }
            | AdminError::Unauthenticated
            | AdminError::RateLimited(_)
            | AdminError::Cancelled
            | AdminError::Internal(_) => return Map::new(),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.root().category() == ErrorCategory::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), AdminError::AlreadyExists { .. })
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::validation("payload", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_status_codes() {
        assert_eq!(AdminError::not_found("panel", "pages").http_status(), 404);
        assert_eq!(AdminError::validation("name", "required").http_status(), 400);
        assert_eq!(AdminError::Unauthenticated.http_status(), 401);
        assert_eq!(AdminError::forbidden("view", "pages").http_status(), 403);
        assert_eq!(AdminError::ServiceNotConfigured("menus".into()).http_status(), 503);
        assert_eq!(AdminError::internal("boom").http_status(), 500);
    }

    #[test]
    fn test_version_conflict_metadata() {
        let err = AdminError::WorkflowVersionConflict {
            workflow_id: "editorial.default".into(),
            expected_version: 1,
            actual_version: 2,
        };
        let metadata = err.metadata();
        assert_eq!(metadata["expected_version"], json!(1));
        assert_eq!(metadata["actual_version"], json!(2));
        assert_eq!(err.text_code(), "WORKFLOW_VERSION_CONFLICT");
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_command_frame_keeps_root_shape() {
        let err = AdminError::not_found("assignment", "a-1").in_command("translation.claim");
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.text_code(), "NOT_FOUND");
        assert!(err.is_not_found());
        let metadata = err.metadata();
        assert_eq!(metadata["command"], json!("translation.claim"));
        assert_eq!(metadata["id"], json!("a-1"));
    }

    #[test]
    fn test_forbidden_has_no_metadata() {
        assert!(AdminError::forbidden("admin.pages.delete", "pages")
            .metadata()
            .is_empty());
        assert!(AdminError::Unauthenticated.metadata().is_empty());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ErrorCategory::FeatureDisabled).unwrap();
        assert_eq!(json, "\"feature-disabled\"");
        for category in ErrorCategory::ALL {
            let encoded = serde_json::to_value(category).unwrap();
            assert_eq!(encoded, json!(category.as_str()));
        }
    }
}
