//! Assignment persistence
//!
//! The store owns the concurrency checks: the idempotent replay, the
//! expected version and the active-uniqueness key are verified under the
//! same write lock as the write itself.

use crate::model::{AssignmentFilter, TranslationAssignment};
use async_trait::async_trait;
use larch_types::{apply_expected_version, AdminContext, AdminError, AdminResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert(&self, ctx: &AdminContext, assignment: TranslationAssignment) -> AdminResult<TranslationAssignment>;

    /// Replace the stored row if its version equals `expected_version`;
    /// the stored copy gets the next version. A row already written with the
    /// same idempotency key and operation is returned unchanged.
    async fn replace(
        &self,
        ctx: &AdminContext,
        assignment: TranslationAssignment,
        expected_version: u64,
    ) -> AdminResult<TranslationAssignment>;

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<TranslationAssignment>;

    async fn list(&self, ctx: &AdminContext, filter: &AssignmentFilter) -> AdminResult<Vec<TranslationAssignment>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAssignmentStore {
    rows: Arc<RwLock<HashMap<String, TranslationAssignment>>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_active_unique(
    rows: &HashMap<String, TranslationAssignment>,
    candidate: &TranslationAssignment,
) -> AdminResult<()> {
    if !candidate.is_active() {
        return Ok(());
    }
    let key = candidate.uniqueness_key();
    match rows
        .values()
        .find(|row| row.id != candidate.id && row.is_active() && row.uniqueness_key() == key)
    {
        Some(existing) => Err(AdminError::AssignmentActiveConflict {
            existing_assignment_id: existing.id.clone(),
            uniqueness_key: key.to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn insert(&self, ctx: &AdminContext, assignment: TranslationAssignment) -> AdminResult<TranslationAssignment> {
        ctx.ensure_active()?;
        let mut rows = self.rows.write().await;
        if rows.contains_key(&assignment.id) {
            return Err(AdminError::already_exists("translation assignment", &assignment.id));
        }
        check_active_unique(&rows, &assignment)?;
        rows.insert(assignment.id.clone(), assignment.clone());
        Ok(assignment)
    }

    async fn replace(
        &self,
        ctx: &AdminContext,
        mut assignment: TranslationAssignment,
        expected_version: u64,
    ) -> AdminResult<TranslationAssignment> {
        ctx.ensure_active()?;
        let mut rows = self.rows.write().await;
        let current = rows
            .get(&assignment.id)
            .ok_or_else(|| AdminError::not_found("translation assignment", &assignment.id))?;
        if assignment.last_idempotency_key.is_some()
            && current.last_idempotency_key == assignment.last_idempotency_key
            && current.last_operation == assignment.last_operation
        {
            return Ok(current.clone());
        }
        apply_expected_version(current, &mut assignment, expected_version, |m| {
            AdminError::AssignmentVersionConflict {
                assignment_id: current.id.clone(),
                expected_version: m.expected,
                actual_version: m.actual,
            }
        })?;
        assignment.created_at = current.created_at;
        check_active_unique(&rows, &assignment)?;
        rows.insert(assignment.id.clone(), assignment.clone());
        Ok(assignment)
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<TranslationAssignment> {
        ctx.ensure_active()?;
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found("translation assignment", id))
    }

    async fn list(&self, ctx: &AdminContext, filter: &AssignmentFilter) -> AdminResult<Vec<TranslationAssignment>> {
        ctx.ensure_active()?;
        let rows = self.rows.read().await;
        let mut matched: Vec<TranslationAssignment> = rows.values().filter(|a| filter.matches(a)).cloned().collect();
        matched.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssignmentAction, NewAssignment};
    use crate::queue::TranslationQueue;
    use larch_types::Actor;

    #[tokio::test]
    async fn test_replay_under_write_lock() {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let queue = TranslationQueue::new(store.clone());
        let ctx = AdminContext::new().with_actor(Actor::new("u1"));
        let created = queue
            .create(
                &ctx,
                NewAssignment {
                    translation_group_id: "grp-1".into(),
                    entity_type: "pages".into(),
                    source_record_id: "page_123".into(),
                    source_locale: "en".into(),
                    target_locale: "es".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let claimed = queue
            .claim(&ctx, AssignmentAction::new(&created.id, 1).with_idempotency_key("req-1"))
            .await
            .unwrap();

        // A second writer that read version 1 before the claim landed.
        let mut racing = created.clone();
        racing.last_idempotency_key = Some("req-1".into());
        racing.last_operation = Some("claim".into());
        let replayed = store.replace(&ctx, racing.clone(), 1).await.unwrap();
        assert_eq!(replayed, claimed);

        racing.last_operation = Some("release".into());
        let err = store.replace(&ctx, racing, 1).await.unwrap_err();
        assert_eq!(err.text_code(), "ASSIGNMENT_VERSION_CONFLICT");
    }
}
