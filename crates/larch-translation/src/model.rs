//! Translation assignment model

use chrono::{DateTime, Utc};
use larch_types::{normalize_key, AdminError, AdminResult, Versioned};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Assigned,
    #[default]
    OpenPool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Review,
    Rejected,
    Approved,
    Published,
    Archived,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 8] = [
        AssignmentStatus::Pending,
        AssignmentStatus::Assigned,
        AssignmentStatus::InProgress,
        AssignmentStatus::Review,
        AssignmentStatus::Rejected,
        AssignmentStatus::Approved,
        AssignmentStatus::Published,
        AssignmentStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Review => "review",
            AssignmentStatus::Rejected => "rejected",
            AssignmentStatus::Approved => "approved",
            AssignmentStatus::Published => "published",
            AssignmentStatus::Archived => "archived",
        }
    }

    /// `published` and `archived` are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Published | AssignmentStatus::Archived)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s).replace('-', "_");
        AssignmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == key)
            .ok_or_else(|| AdminError::validation("status", format!("unknown assignment status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Active-uniqueness key: `(group, entity_type, source_locale, target_locale)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniquenessKey {
    pub translation_group_id: String,
    pub entity_type: String,
    pub source_locale: String,
    pub target_locale: String,
}

impl fmt::Display for UniquenessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}->{}",
            self.translation_group_id, self.entity_type, self.source_locale, self.target_locale
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationAssignment {
    pub id: String,
    pub translation_group_id: String,
    pub entity_type: String,
    pub source_record_id: String,
    pub source_locale: String,
    pub target_locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_record_id: Option<String>,
    pub assignment_type: AssignmentType,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub priority: AssignmentPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub version: u64,
    /// Idempotency key of the last applied mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_idempotency_key: Option<String>,
    /// Operation that `last_idempotency_key` was applied with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl TranslationAssignment {
    pub fn uniqueness_key(&self) -> UniquenessKey {
        UniquenessKey {
            translation_group_id: self.translation_group_id.clone(),
            entity_type: self.entity_type.clone(),
            source_locale: self.source_locale.clone(),
            target_locale: self.target_locale.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn validate(&self) -> AdminResult<()> {
        for (field, value) in [
            ("id", &self.id),
            ("translation_group_id", &self.translation_group_id),
            ("entity_type", &self.entity_type),
            ("source_record_id", &self.source_record_id),
            ("source_locale", &self.source_locale),
            ("target_locale", &self.target_locale),
        ] {
            if value.trim().is_empty() {
                return Err(AdminError::validation(field, format!("{field} is required")));
            }
        }
        if self.source_locale == self.target_locale {
            return Err(AdminError::validation(
                "target_locale",
                "target locale must differ from source locale",
            ));
        }
        if self.assignment_type == AssignmentType::Assigned && self.assignee_id.is_none() {
            return Err(AdminError::validation("assignee_id", "assigned work needs an assignee"));
        }
        Ok(())
    }
}

impl Versioned for TranslationAssignment {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Create input; an assignee makes it direct work, otherwise it joins the open pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAssignment {
    #[serde(default)]
    pub id: Option<String>,
    pub translation_group_id: String,
    pub entity_type: String,
    pub source_record_id: String,
    pub source_locale: String,
    pub target_locale: String,
    #[serde(default)]
    pub target_record_id: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub priority: AssignmentPriority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Defaults to the request actor
    #[serde(default)]
    pub actor_id: String,
}

/// Input for one lifecycle operation on one assignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentAction {
    pub id: String,
    pub expected_version: u64,
    /// Defaults to the request actor
    #[serde(default)]
    pub actor_id: String,
    /// Target of `assign`
    #[serde(default)]
    pub assignee_id: Option<String>,
    /// Recorded by `reject`
    #[serde(default)]
    pub reason: Option<String>,
    /// Replaying a key already applied returns the stored assignment
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl AssignmentAction {
    pub fn new(id: impl Into<String>, expected_version: u64) -> Self {
        Self {
            id: id.into(),
            expected_version,
            ..Default::default()
        }
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    pub fn to_assignee(mut self, assignee_id: impl Into<String>) -> Self {
        self.assignee_id = Some(assignee_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn validate(&self) -> AdminResult<()> {
        if self.id.trim().is_empty() {
            return Err(AdminError::validation("id", "assignment id is required"));
        }
        if self.expected_version == 0 {
            return Err(AdminError::validation("expected_version", "expected_version is required"));
        }
        if self.actor_id.trim().is_empty() {
            return Err(AdminError::validation("actor_id", "an actor is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTarget {
    pub id: String,
    pub expected_version: u64,
}

/// The same operation applied to several assignments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkAssignmentAction {
    pub items: Vec<BulkTarget>,
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl BulkAssignmentAction {
    pub fn actions(&self) -> impl Iterator<Item = AssignmentAction> + '_ {
        self.items.iter().map(|item| AssignmentAction {
            id: item.id.clone(),
            expected_version: item.expected_version,
            actor_id: self.actor_id.clone(),
            assignee_id: self.assignee_id.clone(),
            reason: self.reason.clone(),
            idempotency_key: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub text_code: String,
    pub category: String,
    pub message: String,
}

impl From<&AdminError> for BulkFailure {
    fn from(err: &AdminError) -> Self {
        Self {
            text_code: err.text_code().to_string(),
            category: err.category().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-id result of a bulk operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<TranslationAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentFilter {
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub target_locale: Option<String>,
    #[serde(default)]
    pub translation_group_id: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &TranslationAssignment) -> bool {
        self.status.map_or(true, |s| assignment.status == s)
            && self
                .assignee_id
                .as_ref()
                .map_or(true, |a| assignment.assignee_id.as_ref() == Some(a))
            && self
                .target_locale
                .as_ref()
                .map_or(true, |l| assignment.target_locale.eq_ignore_ascii_case(l))
            && self
                .translation_group_id
                .as_ref()
                .map_or(true, |g| &assignment.translation_group_id == g)
            && self
                .entity_type
                .as_ref()
                .map_or(true, |e| assignment.entity_type.eq_ignore_ascii_case(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_terminal() {
        assert_eq!("In-Progress".parse::<AssignmentStatus>().unwrap(), AssignmentStatus::InProgress);
        assert!("done".parse::<AssignmentStatus>().is_err());
        let terminal: Vec<_> = AssignmentStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![AssignmentStatus::Published, AssignmentStatus::Archived]);
    }

    #[test]
    fn test_action_validation() {
        assert!(AssignmentAction::new("a1", 1).by("u1").validate().is_ok());
        assert!(AssignmentAction::new("", 1).by("u1").validate().is_err());
        assert!(AssignmentAction::new("a1", 0).by("u1").validate().is_err());
        assert!(AssignmentAction::new("a1", 1).validate().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_value(AssignmentStatus::InProgress).unwrap();
        assert_eq!(json, "in_progress");
        let json = serde_json::to_value(AssignmentType::OpenPool).unwrap();
        assert_eq!(json, "open_pool");
    }
}
