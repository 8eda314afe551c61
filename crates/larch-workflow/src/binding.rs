//! Workflow bindings
//!
//! A binding attaches a workflow to a scope. Among active bindings the tuple
//! `(scope_type, scope_ref, environment, priority)` is unique.

use chrono::{DateTime, Utc};
use larch_types::{normalize_key, AdminError, AdminResult, Versioned};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `scope_ref` stored for global bindings
pub const GLOBAL_SCOPE_REF: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Global,
    Trait,
    ContentType,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Global => "global",
            ScopeType::Trait => "trait",
            ScopeType::ContentType => "content_type",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).replace('-', "_").as_str() {
            "global" => Ok(ScopeType::Global),
            "trait" => Ok(ScopeType::Trait),
            "content_type" => Ok(ScopeType::ContentType),
            other => Err(AdminError::validation(
                "scope_type",
                format!("unknown scope type {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    #[default]
    Active,
    Inactive,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::Active => "active",
            BindingStatus::Inactive => "inactive",
        }
    }
}

/// A stored binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowBinding {
    pub id: String,
    pub scope_type: ScopeType,
    pub scope_ref: String,
    pub workflow_id: String,
    pub priority: u32,
    pub status: BindingStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowBinding {
    pub fn is_active(&self) -> bool {
        self.status == BindingStatus::Active
    }

    /// Normalize references in place; global bindings get [`GLOBAL_SCOPE_REF`].
    pub fn normalize(&mut self) {
        self.scope_ref = match self.scope_type {
            ScopeType::Global => GLOBAL_SCOPE_REF.to_string(),
            _ => normalize_key(&self.scope_ref),
        };
        self.workflow_id = normalize_key(&self.workflow_id);
        self.environment = normalize_key(&self.environment);
    }

    pub fn validate(&self) -> AdminResult<()> {
        if self.scope_type != ScopeType::Global && self.scope_ref.trim().is_empty() {
            return Err(AdminError::validation(
                "scope_ref",
                format!("scope_ref is required for {} bindings", self.scope_type),
            ));
        }
        if self.workflow_id.trim().is_empty() {
            return Err(AdminError::validation("workflow_id", "workflow_id is required"));
        }
        Ok(())
    }

    /// True when both are active and share the uniqueness tuple
    pub fn collides_with(&self, other: &WorkflowBinding) -> bool {
        self.is_active()
            && other.is_active()
            && self.id != other.id
            && self.scope_type == other.scope_type
            && self.scope_ref == other.scope_ref
            && self.environment == other.environment
            && self.priority == other.priority
    }

    pub fn conflict_error(&self) -> AdminError {
        AdminError::BindingConflict {
            existing_binding_id: self.id.clone(),
            scope_type: self.scope_type.to_string(),
            scope_ref: self.scope_ref.clone(),
            environment: (!self.environment.is_empty()).then(|| self.environment.clone()),
            priority: self.priority,
        }
    }

    /// Whether this binding applies to the requested environment.
    ///
    /// An empty binding environment matches anything; otherwise the input
    /// must be equal and non-empty.
    pub fn matches_environment(&self, environment: &str) -> bool {
        self.environment.is_empty() || (!environment.is_empty() && self.environment == environment)
    }
}

impl Versioned for WorkflowBinding {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Input for creating a binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBinding {
    #[serde(default)]
    pub id: Option<String>,
    pub scope_type: ScopeType,
    #[serde(default)]
    pub scope_ref: Option<String>,
    pub workflow_id: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub status: BindingStatus,
    #[serde(default)]
    pub environment: Option<String>,
}

impl NewBinding {
    pub fn new(scope_type: ScopeType, scope_ref: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            id: None,
            scope_type,
            scope_ref: Some(scope_ref.into()),
            workflow_id: workflow_id.into(),
            priority: 0,
            status: BindingStatus::Active,
            environment: None,
        }
    }

    pub fn global(workflow_id: impl Into<String>) -> Self {
        Self::new(ScopeType::Global, GLOBAL_SCOPE_REF, workflow_id)
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_status(mut self, status: BindingStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial binding update; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingUpdate {
    #[serde(default)]
    pub scope_type: Option<ScopeType>,
    #[serde(default)]
    pub scope_ref: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub status: Option<BindingStatus>,
    #[serde(default)]
    pub environment: Option<String>,
}

/// Filter for listing bindings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingFilter {
    #[serde(default)]
    pub scope_type: Option<ScopeType>,
    #[serde(default)]
    pub scope_ref: Option<String>,
    #[serde(default)]
    pub status: Option<BindingStatus>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl BindingFilter {
    pub fn active() -> Self {
        Self {
            status: Some(BindingStatus::Active),
            ..Default::default()
        }
    }

    pub fn matches(&self, binding: &WorkflowBinding) -> bool {
        if self.scope_type.is_some_and(|s| s != binding.scope_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != binding.status) {
            return false;
        }
        if let Some(scope_ref) = &self.scope_ref {
            if binding.scope_ref != normalize_key(scope_ref) {
                return false;
            }
        }
        match &self.environment {
            Some(env) => binding.environment == normalize_key(env),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(id: &str, scope_type: ScopeType, scope_ref: &str, priority: u32) -> WorkflowBinding {
        let now = Utc::now();
        let mut b = WorkflowBinding {
            id: id.into(),
            scope_type,
            scope_ref: scope_ref.into(),
            workflow_id: "Editorial.Default".into(),
            priority,
            status: BindingStatus::Active,
            environment: String::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        b.normalize();
        b
    }

    #[test]
    fn test_global_scope_ref_normalized() {
        let b = binding("b1", ScopeType::Global, "", 0);
        assert_eq!(b.scope_ref, GLOBAL_SCOPE_REF);
        assert_eq!(b.workflow_id, "editorial.default");
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_scope_ref_required() {
        let b = binding("b1", ScopeType::Trait, " ", 0);
        assert_eq!(b.validate().unwrap_err().metadata()["field"], "scope_ref");
    }

    #[test]
    fn test_collision_rules() {
        let a = binding("a", ScopeType::Trait, "editorial", 10);
        let mut b = binding("b", ScopeType::Trait, "Editorial", 10);
        assert!(a.collides_with(&b));

        b.priority = 11;
        assert!(!a.collides_with(&b));

        b.priority = 10;
        b.status = BindingStatus::Inactive;
        assert!(!a.collides_with(&b));

        b.status = BindingStatus::Active;
        b.environment = "staging".into();
        assert!(!a.collides_with(&b));
    }

    #[test]
    fn test_environment_matching() {
        let mut b = binding("a", ScopeType::Global, "", 0);
        assert!(b.matches_environment(""));
        assert!(b.matches_environment("production"));
        b.environment = "production".into();
        assert!(b.matches_environment("production"));
        assert!(!b.matches_environment(""));
        assert!(!b.matches_environment("staging"));
    }

    #[test]
    fn test_scope_type_parse() {
        assert_eq!("content-type".parse::<ScopeType>().unwrap(), ScopeType::ContentType);
        assert_eq!(
            serde_json::to_value(ScopeType::ContentType).unwrap(),
            serde_json::json!("content_type")
        );
    }
}
