//! Translation queue service

use crate::model::{
    AssignmentAction, AssignmentFilter, AssignmentStatus, AssignmentType, BulkAssignmentAction, BulkFailure,
    BulkOutcome, NewAssignment, TranslationAssignment,
};
use crate::store::AssignmentStore;
use chrono::{DateTime, Utc};
use larch_types::{normalize_key, non_empty, AdminContext, AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    Claim,
    Assign,
    Release,
    SubmitReview,
    Approve,
    Reject,
    Publish,
    Archive,
}

impl QueueOperation {
    pub const ALL: [QueueOperation; 8] = [
        QueueOperation::Claim,
        QueueOperation::Assign,
        QueueOperation::Release,
        QueueOperation::SubmitReview,
        QueueOperation::Approve,
        QueueOperation::Reject,
        QueueOperation::Publish,
        QueueOperation::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Claim => "claim",
            QueueOperation::Assign => "assign",
            QueueOperation::Release => "release",
            QueueOperation::SubmitReview => "submit_review",
            QueueOperation::Approve => "approve",
            QueueOperation::Reject => "reject",
            QueueOperation::Publish => "publish",
            QueueOperation::Archive => "archive",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize_key(name).replace('-', "_");
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    fn invalid(&self, from: AssignmentStatus) -> AdminError {
        AdminError::InvalidTransition {
            entity_type: "translation_assignment".into(),
            from_state: from.to_string(),
            transition: self.as_str().into(),
        }
    }

    /// Apply the operation to `a` in place.
    fn apply(&self, a: &mut TranslationAssignment, action: &AssignmentAction, now: DateTime<Utc>) -> AdminResult<()> {
        use AssignmentStatus::*;

        let actor = action.actor_id.as_str();
        let is_assignee = a.assignee_id.as_deref() == Some(actor);
        match (self, a.status) {
            (QueueOperation::Claim, Pending) if a.assignment_type == AssignmentType::OpenPool => {
                a.assignee_id = Some(actor.to_string());
                a.assignment_type = AssignmentType::Assigned;
            }
            (QueueOperation::Claim, Assigned | Rejected) => {
                if !is_assignee {
                    return Err(AdminError::forbidden("claim", format!("translation assignment {}", a.id)));
                }
            }
            (QueueOperation::Assign, Pending | Assigned | Rejected) => {
                let assignee = non_empty(action.assignee_id.as_deref())
                    .ok_or_else(|| AdminError::validation("assignee_id", "assign needs an assignee"))?;
                a.assignee_id = Some(assignee);
                a.assigner_id = Some(actor.to_string());
                a.assignment_type = AssignmentType::Assigned;
                a.status = Assigned;
                return Ok(());
            }
            (QueueOperation::Release, Assigned | InProgress) => {
                a.assignee_id = None;
                a.assignment_type = AssignmentType::OpenPool;
                a.status = Pending;
                a.claimed_at = None;
                return Ok(());
            }
            (QueueOperation::SubmitReview, InProgress) => {
                if !is_assignee {
                    return Err(AdminError::forbidden("submit_review", format!("translation assignment {}", a.id)));
                }
                a.status = Review;
                a.submitted_at = Some(now);
                return Ok(());
            }
            (QueueOperation::Approve, Review) => {
                a.status = Approved;
                a.reviewer_id = Some(actor.to_string());
                a.reviewed_at = Some(now);
                a.rejection_reason = None;
                return Ok(());
            }
            (QueueOperation::Reject, Review) => {
                a.status = Rejected;
                a.reviewer_id = Some(actor.to_string());
                a.reviewed_at = Some(now);
                a.rejection_reason = non_empty(action.reason.as_deref());
                return Ok(());
            }
            (QueueOperation::Publish, Approved) => {
                a.status = Published;
                a.published_at = Some(now);
                return Ok(());
            }
            (QueueOperation::Archive, status) if !status.is_terminal() => {
                a.status = Archived;
                a.archived_at = Some(now);
                return Ok(());
            }
            (op, status) => return Err(op.invalid(status)),
        }
        // Claim paths end here.
        a.status = InProgress;
        a.claimed_at = Some(now);
        Ok(())
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle service over an [`AssignmentStore`]
#[derive(Clone)]
pub struct TranslationQueue {
    store: Arc<dyn AssignmentStore>,
}

impl TranslationQueue {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    fn actor(ctx: &AdminContext, actor_id: &str) -> String {
        if actor_id.trim().is_empty() {
            ctx.user_id().to_string()
        } else {
            actor_id.trim().to_string()
        }
    }

    pub async fn create(&self, ctx: &AdminContext, input: NewAssignment) -> AdminResult<TranslationAssignment> {
        let actor = Self::actor(ctx, &input.actor_id);
        let assignee = non_empty(input.assignee_id.as_deref());
        let now = Utc::now();
        let (assignment_type, status) = match assignee {
            Some(_) => (AssignmentType::Assigned, AssignmentStatus::Assigned),
            None => (AssignmentType::OpenPool, AssignmentStatus::Pending),
        };
        let assignment = TranslationAssignment {
            id: non_empty(input.id.as_deref()).unwrap_or_else(|| Uuid::new_v4().to_string()),
            translation_group_id: input.translation_group_id.trim().to_string(),
            entity_type: normalize_key(&input.entity_type),
            source_record_id: input.source_record_id.trim().to_string(),
            source_locale: normalize_key(&input.source_locale),
            target_locale: normalize_key(&input.target_locale),
            target_record_id: non_empty(input.target_record_id.as_deref()),
            assignment_type,
            status,
            priority: input.priority,
            assigner_id: assignee.as_ref().and_then(|_| non_empty(Some(actor.as_str()))),
            assignee_id: assignee,
            reviewer_id: None,
            rejection_reason: None,
            due_date: input.due_date,
            version: 1,
            last_idempotency_key: None,
            last_operation: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            submitted_at: None,
            reviewed_at: None,
            published_at: None,
            archived_at: None,
        };
        assignment.validate()?;
        let stored = self.store.insert(ctx, assignment).await?;
        tracing::info!(
            assignment = %stored.id,
            group = %stored.translation_group_id,
            target_locale = %stored.target_locale,
            status = %stored.status,
            "Translation assignment created"
        );
        Ok(stored)
    }

    pub async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<TranslationAssignment> {
        self.store.get(ctx, id).await
    }

    pub async fn list(&self, ctx: &AdminContext, filter: &AssignmentFilter) -> AdminResult<Vec<TranslationAssignment>> {
        self.store.list(ctx, filter).await
    }

    /// Run one lifecycle operation.
    pub async fn execute(
        &self,
        ctx: &AdminContext,
        op: QueueOperation,
        mut action: AssignmentAction,
    ) -> AdminResult<TranslationAssignment> {
        ctx.ensure_active()?;
        action.actor_id = Self::actor(ctx, &action.actor_id);
        action.validate()?;

        let current = self.store.get(ctx, &action.id).await?;
        let op_name = op.to_string();
        if let (Some(key), Some(last)) = (&action.idempotency_key, &current.last_idempotency_key) {
            if key == last {
                if current.last_operation.as_deref() != Some(op_name.as_str()) {
                    return Err(AdminError::validation(
                        "idempotency_key",
                        format!("idempotency key {key} was already used for another operation"),
                    ));
                }
                tracing::debug!(assignment = %current.id, op = %op, "Idempotent replay");
                return Ok(current);
            }
        }

        // Stale callers learn about the conflict before any state check; the
        // store repeats the check under its write lock.
        if current.version != action.expected_version {
            return Err(AdminError::AssignmentVersionConflict {
                assignment_id: current.id.clone(),
                expected_version: action.expected_version,
                actual_version: current.version,
            });
        }

        let mut next = current.clone();
        let now = Utc::now();
        op.apply(&mut next, &action, now)?;
        next.updated_at = now;
        next.last_idempotency_key = action.idempotency_key.clone();
        next.last_operation = action.idempotency_key.as_ref().map(|_| op_name);

        let stored = self.store.replace(ctx, next, action.expected_version).await?;
        tracing::info!(
            assignment = %stored.id,
            op = %op,
            actor = %action.actor_id,
            from = %current.status,
            to = %stored.status,
            version = stored.version,
            "Translation assignment updated"
        );
        Ok(stored)
    }

    /// Run one operation per target; failures are reported per id.
    pub async fn execute_bulk(
        &self,
        ctx: &AdminContext,
        op: QueueOperation,
        input: BulkAssignmentAction,
    ) -> AdminResult<Vec<BulkOutcome>> {
        if input.items.is_empty() {
            return Err(AdminError::validation("items", "bulk operations need at least one item"));
        }
        let mut outcomes = Vec::with_capacity(input.items.len());
        for action in input.actions() {
            ctx.ensure_active()?;
            let id = action.id.clone();
            let outcome = match self.execute(ctx, op, action).await {
                Ok(assignment) => BulkOutcome {
                    id,
                    assignment: Some(assignment),
                    error: None,
                },
                Err(err) => BulkOutcome {
                    id,
                    assignment: None,
                    error: Some(BulkFailure::from(&err)),
                },
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    pub async fn claim(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Claim, action).await
    }

    pub async fn assign(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Assign, action).await
    }

    pub async fn release(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Release, action).await
    }

    pub async fn submit_review(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::SubmitReview, action).await
    }

    pub async fn approve(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Approve, action).await
    }

    pub async fn reject(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Reject, action).await
    }

    pub async fn publish(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Publish, action).await
    }

    pub async fn archive(&self, ctx: &AdminContext, action: AssignmentAction) -> AdminResult<TranslationAssignment> {
        self.execute(ctx, QueueOperation::Archive, action).await
    }
}
