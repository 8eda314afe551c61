//! Workflow definitions and their persisted form

use chrono::{DateTime, Utc};
use larch_types::{normalize_key, AdminError, AdminResult, Versioned};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A named edge between two states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl WorkflowTransition {
    pub fn new(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// State machine: an initial state and its transitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub initial_state: String,
    pub transitions: Vec<WorkflowTransition>,
}

impl WorkflowDefinition {
    pub fn new(initial_state: impl Into<String>) -> Self {
        Self {
            initial_state: initial_state.into(),
            transitions: Vec::new(),
        }
    }

    pub fn with_transition(mut self, transition: WorkflowTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Trim every state and transition name in place.
    pub fn normalize(&mut self) {
        self.initial_state = self.initial_state.trim().to_string();
        for t in &mut self.transitions {
            t.name = t.name.trim().to_string();
            t.from = t.from.trim().to_string();
            t.to = t.to.trim().to_string();
            t.description = t.description.trim().to_string();
        }
    }

    /// Check structural invariants.
    ///
    /// Transitions must be non-empty, the initial state set, and transition
    /// names unique ignoring case.
    pub fn validate(&self) -> AdminResult<()> {
        if self.initial_state.trim().is_empty() {
            return Err(AdminError::validation(
                "definition.initial_state",
                "initial state is required",
            ));
        }
        if self.transitions.is_empty() {
            return Err(AdminError::validation(
                "definition.transitions",
                "at least one transition is required",
            ));
        }

        let mut seen = HashSet::new();
        for (i, t) in self.transitions.iter().enumerate() {
            if t.name.trim().is_empty() {
                return Err(AdminError::validation(
                    format!("definition.transitions[{i}].name"),
                    "transition name is required",
                ));
            }
            if t.from.trim().is_empty() || t.to.trim().is_empty() {
                return Err(AdminError::validation(
                    format!("definition.transitions[{i}]"),
                    "transition requires from and to states",
                ));
            }
            if !seen.insert(normalize_key(&t.name)) {
                return Err(AdminError::validation(
                    format!("definition.transitions[{i}].name"),
                    format!("duplicate transition name {}", t.name.trim()),
                ));
            }
        }
        Ok(())
    }

    /// Transitions leaving `state`, in declaration order
    pub fn transitions_from<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a WorkflowTransition> {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    pub fn find_transition<'a>(&'a self, state: &'a str, name: &str) -> Option<&'a WorkflowTransition> {
        let name = name.trim();
        self.transitions_from(state)
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Lifecycle status of a persisted workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            "deprecated" => Ok(WorkflowStatus::Deprecated),
            other => Err(AdminError::validation(
                "status",
                format!("unknown workflow status {other}"),
            )),
        }
    }
}

/// A stored workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWorkflow {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub version: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    pub definition: WorkflowDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedWorkflow {
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    pub fn validate(&self) -> AdminResult<()> {
        if self.id.is_empty() {
            return Err(AdminError::validation("id", "workflow id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(AdminError::validation("name", "workflow name is required"));
        }
        self.definition.validate()
    }

    /// Snapshot of the current state
    pub fn revision(&self) -> WorkflowRevision {
        WorkflowRevision {
            workflow_id: self.id.clone(),
            version: self.version,
            name: self.name.clone(),
            status: self.status,
            environment: self.environment.clone(),
            definition: self.definition.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Versioned for PersistedWorkflow {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Immutable snapshot keyed by `(workflow_id, version)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRevision {
    pub workflow_id: String,
    pub version: u64,
    pub name: String,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    pub definition: WorkflowDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a workflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWorkflow {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub environment: Option<String>,
    pub definition: WorkflowDefinition,
}

/// Partial update; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub definition: Option<WorkflowDefinition>,
}

impl WorkflowUpdate {
    /// Restore every field from a revision.
    pub fn from_revision(revision: &WorkflowRevision) -> Self {
        Self {
            name: Some(revision.name.clone()),
            status: Some(revision.status),
            environment: Some(revision.environment.clone()),
            definition: Some(revision.definition.clone()),
        }
    }
}

/// Filter for listing workflows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowFilter {
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl WorkflowFilter {
    pub fn matches(&self, workflow: &PersistedWorkflow) -> bool {
        if let Some(status) = self.status {
            if workflow.status != status {
                return false;
            }
        }
        match &self.environment {
            Some(env) => workflow.environment == normalize_key(env),
            None => true,
        }
    }
}
