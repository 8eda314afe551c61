//! Workflow runtime
//!
//! Versioned workflow CRUD with rollback, binding CRUD, binding resolution
//! and propagation of active definitions into the engine.

use crate::binding::{BindingFilter, BindingUpdate, NewBinding, WorkflowBinding};
use crate::definition::{
    NewWorkflow, PersistedWorkflow, WorkflowFilter, WorkflowRevision, WorkflowStatus,
    WorkflowUpdate,
};
use crate::engine::WorkflowRegistrar;
use crate::resolution::{self, BindingQuery, ResolvedBinding};
use crate::store::{WorkflowBindingStore, WorkflowDefinitionStore, WorkflowStore};
use chrono::Utc;
use larch_types::{non_empty, normalize_key, AdminContext, AdminError, AdminResult};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Workflow and binding management over a [`WorkflowStore`]
pub struct WorkflowRuntime {
    store: Arc<dyn WorkflowStore>,
    registrar: RwLock<Option<Arc<dyn WorkflowRegistrar>>>,
}

impl std::fmt::Debug for WorkflowRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRuntime").finish_non_exhaustive()
    }
}

fn require_expected_version(expected_version: u64) -> AdminResult<()> {
    if expected_version == 0 {
        Err(AdminError::validation(
            "expected_version",
            "expected_version must be greater than zero",
        ))
    } else {
        Ok(())
    }
}

impl WorkflowRuntime {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            store,
            registrar: RwLock::new(None),
        }
    }

    // -- workflows ---------------------------------------------------------

    pub async fn create_workflow(&self, ctx: &AdminContext, input: NewWorkflow) -> AdminResult<PersistedWorkflow> {
        let now = Utc::now();
        let id = non_empty(input.id.as_deref())
            .map(|id| normalize_key(&id))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut definition = input.definition;
        definition.normalize();

        let workflow = PersistedWorkflow {
            id,
            name: input.name.trim().to_string(),
            status: input.status.unwrap_or_default(),
            version: 1,
            environment: normalize_key(input.environment.as_deref().unwrap_or_default()),
            definition,
            created_at: now,
            updated_at: now,
        };
        workflow.validate()?;

        let stored = self.store.insert_workflow(ctx, workflow).await?;
        tracing::info!(workflow_id = %stored.id, status = %stored.status, "Workflow created");
        self.sync_engine(&stored).await?;
        Ok(stored)
    }

    /// Apply `update` if the stored version equals `expected_version`.
    ///
    /// Unspecified fields keep their current values.
    pub async fn update_workflow(
        &self,
        ctx: &AdminContext,
        id: &str,
        update: WorkflowUpdate,
        expected_version: u64,
    ) -> AdminResult<PersistedWorkflow> {
        require_expected_version(expected_version)?;
        let id = normalize_key(id);
        let current = self.store.get_workflow(ctx, &id).await?;

        let mut next = current.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(environment) = update.environment {
            next.environment = normalize_key(&environment);
        }
        if let Some(mut definition) = update.definition {
            definition.normalize();
            next.definition = definition;
        }
        next.updated_at = Utc::now();
        next.validate()?;

        let stored = self
            .store
            .replace_workflow(ctx, next, expected_version)
            .await?;
        tracing::info!(workflow_id = %stored.id, version = stored.version, "Workflow updated");
        self.sync_engine(&stored).await?;
        Ok(stored)
    }

    /// Restore revision `target_version` as a new version.
    pub async fn rollback_workflow(
        &self,
        ctx: &AdminContext,
        id: &str,
        target_version: u64,
        expected_version: u64,
    ) -> AdminResult<PersistedWorkflow> {
        require_expected_version(expected_version)?;
        let id = normalize_key(id);
        self.store.get_workflow(ctx, &id).await?;
        let revision = self
            .store
            .get_revision(ctx, &id, target_version)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    AdminError::RollbackVersionNotFound {
                        workflow_id: id.clone(),
                        version: target_version,
                    }
                } else {
                    err
                }
            })?;

        let stored = self
            .update_workflow(ctx, &id, WorkflowUpdate::from_revision(&revision), expected_version)
            .await?;
        tracing::info!(
            workflow_id = %stored.id,
            restored_version = target_version,
            version = stored.version,
            "Workflow rolled back"
        );
        Ok(stored)
    }

    pub async fn get_workflow(&self, ctx: &AdminContext, id: &str) -> AdminResult<PersistedWorkflow> {
        self.store.get_workflow(ctx, &normalize_key(id)).await
    }

    pub async fn get_workflow_version(&self, ctx: &AdminContext, id: &str, version: u64) -> AdminResult<WorkflowRevision> {
        self.store.get_revision(ctx, &normalize_key(id), version).await
    }

    pub async fn list_workflows(&self, ctx: &AdminContext, filter: &WorkflowFilter) -> AdminResult<Vec<PersistedWorkflow>> {
        self.store.list_workflows(ctx, filter).await
    }

    pub async fn list_revisions(&self, ctx: &AdminContext, id: &str) -> AdminResult<Vec<WorkflowRevision>> {
        self.store.list_revisions(ctx, &normalize_key(id)).await
    }

    // -- bindings ----------------------------------------------------------

    pub async fn create_binding(&self, ctx: &AdminContext, input: NewBinding) -> AdminResult<WorkflowBinding> {
        let now = Utc::now();
        let mut binding = WorkflowBinding {
            id: non_empty(input.id.as_deref()).unwrap_or_else(|| Uuid::new_v4().to_string()),
            scope_type: input.scope_type,
            scope_ref: input.scope_ref.unwrap_or_default(),
            workflow_id: input.workflow_id,
            priority: input.priority,
            status: input.status,
            environment: input.environment.unwrap_or_default(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        binding.normalize();
        binding.validate()?;

        let stored = self.store.insert_binding(ctx, binding).await?;
        tracing::info!(
            binding_id = %stored.id,
            scope_type = %stored.scope_type,
            scope_ref = %stored.scope_ref,
            workflow_id = %stored.workflow_id,
            priority = stored.priority,
            "Workflow binding created"
        );
        Ok(stored)
    }

    pub async fn update_binding(
        &self,
        ctx: &AdminContext,
        id: &str,
        update: BindingUpdate,
        expected_version: u64,
    ) -> AdminResult<WorkflowBinding> {
        require_expected_version(expected_version)?;
        let current = self.store.get_binding(ctx, id.trim()).await?;

        let mut next = current.clone();
        if let Some(scope_type) = update.scope_type {
            next.scope_type = scope_type;
        }
        if let Some(scope_ref) = update.scope_ref {
            next.scope_ref = scope_ref;
        }
        if let Some(workflow_id) = update.workflow_id {
            next.workflow_id = workflow_id;
        }
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(environment) = update.environment {
            next.environment = environment;
        }
        next.updated_at = Utc::now();
        next.normalize();
        next.validate()?;

        let stored = self
            .store
            .replace_binding(ctx, next, expected_version)
            .await?;
        tracing::info!(binding_id = %stored.id, version = stored.version, "Workflow binding updated");
        Ok(stored)
    }

    pub async fn delete_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        self.store.delete_binding(ctx, id.trim()).await?;
        tracing::info!(binding_id = %id, "Workflow binding deleted");
        Ok(())
    }

    pub async fn get_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<WorkflowBinding> {
        self.store.get_binding(ctx, id.trim()).await
    }

    pub async fn list_bindings(&self, ctx: &AdminContext, filter: &BindingFilter) -> AdminResult<Vec<WorkflowBinding>> {
        self.store.list_bindings(ctx, filter).await
    }

    /// Resolve the workflow for a content type and its traits.
    pub async fn resolve_binding(&self, ctx: &AdminContext, query: &BindingQuery) -> AdminResult<Option<ResolvedBinding>> {
        let active = self.store.list_bindings(ctx, &BindingFilter::active()).await?;
        Ok(resolution::resolve(&active, query))
    }

    // -- engine ------------------------------------------------------------

    /// Register every active workflow with `registrar` and keep it updated.
    ///
    /// Returns the number of definitions registered.
    pub async fn bind_workflow_engine(
        &self,
        ctx: &AdminContext,
        registrar: Arc<dyn WorkflowRegistrar>,
    ) -> AdminResult<usize> {
        let filter = WorkflowFilter {
            status: Some(WorkflowStatus::Active),
            environment: None,
        };
        let active = self.store.list_workflows(ctx, &filter).await?;
        for workflow in &active {
            registrar
                .register_workflow(&workflow.id, workflow.definition.clone())
                .await?;
        }
        *self.registrar.write().await = Some(registrar);
        tracing::info!(count = active.len(), "Workflow engine bound");
        Ok(active.len())
    }

    async fn sync_engine(&self, workflow: &PersistedWorkflow) -> AdminResult<()> {
        if !workflow.is_active() {
            return Ok(());
        }
        let registrar = self.registrar.read().await.clone();
        if let Some(registrar) = registrar {
            registrar
                .register_workflow(&workflow.id, workflow.definition.clone())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingStatus, ScopeType};
    use crate::definition::{WorkflowDefinition, WorkflowTransition};
    use crate::engine::{InMemoryWorkflowEngine, WorkflowEngine};
    use crate::memory::InMemoryWorkflowStore;

    fn runtime() -> WorkflowRuntime {
        WorkflowRuntime::new(Arc::new(InMemoryWorkflowStore::new()))
    }

    fn publish_only() -> WorkflowDefinition {
        WorkflowDefinition::new("draft")
            .with_transition(WorkflowTransition::new("publish", "draft", "published"))
    }

    fn new_workflow(id: &str, status: WorkflowStatus) -> NewWorkflow {
        NewWorkflow {
            id: Some(id.into()),
            name: "Editorial Default".into(),
            status: Some(status),
            environment: None,
            definition: publish_only(),
        }
    }

    #[tokio::test]
    async fn test_rollback_restores_revision_as_new_version() {
        let rt = runtime();
        let ctx = AdminContext::new();
        let created = rt
            .create_workflow(&ctx, new_workflow("editorial.default", WorkflowStatus::Draft))
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let updated = rt
            .update_workflow(
                &ctx,
                "editorial.default",
                WorkflowUpdate {
                    name: Some("Editorial Default v2".into()),
                    status: Some(WorkflowStatus::Active),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);

        let rolled = rt.rollback_workflow(&ctx, "editorial.default", 1, 2).await.unwrap();
        assert_eq!(rolled.name, "Editorial Default");
        assert_eq!(rolled.status, WorkflowStatus::Draft);
        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.created_at, created.created_at);

        let versions: Vec<u64> = rt
            .list_revisions(&ctx, "editorial.default")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(
            rt.get_workflow_version(&ctx, "editorial.default", 2).await.unwrap().name,
            "Editorial Default v2"
        );
    }

    #[tokio::test]
    async fn test_update_version_conflict() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("w", WorkflowStatus::Draft)).await.unwrap();

        let err = rt
            .update_workflow(&ctx, "w", WorkflowUpdate::default(), 5)
            .await
            .unwrap_err();
        assert_eq!(err.text_code(), "WORKFLOW_VERSION_CONFLICT");
        assert_eq!(err.metadata()["expected_version"], 5);
        assert_eq!(err.metadata()["actual_version"], 1);

        let err = rt
            .update_workflow(&ctx, "w", WorkflowUpdate::default(), 0)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_rollback_unknown_version() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("w", WorkflowStatus::Draft)).await.unwrap();
        let err = rt.rollback_workflow(&ctx, "w", 7, 1).await.unwrap_err();
        assert_eq!(err.text_code(), "ROLLBACK_VERSION_NOT_FOUND");

        let err = rt.rollback_workflow(&ctx, "missing", 1, 1).await.unwrap_err();
        assert_eq!(err.text_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_rejects_invalid() {
        let rt = runtime();
        let ctx = AdminContext::new();
        let mut input = new_workflow("", WorkflowStatus::Draft);
        input.id = None;
        let created = rt.create_workflow(&ctx, input).await.unwrap();
        assert!(!created.id.is_empty());

        let mut invalid = new_workflow("bad", WorkflowStatus::Draft);
        invalid.definition = WorkflowDefinition::new("draft");
        assert!(rt.create_workflow(&ctx, invalid).await.is_err());
        assert!(rt.get_workflow(&ctx, "bad").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_binding_conflict_names_existing() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("editorial.default", WorkflowStatus::Active))
            .await
            .unwrap();
        rt.create_workflow(&ctx, new_workflow("editorial.alt", WorkflowStatus::Active))
            .await
            .unwrap();

        let b1 = rt
            .create_binding(
                &ctx,
                NewBinding::new(ScopeType::Trait, "editorial", "editorial.default").with_priority(10),
            )
            .await
            .unwrap();
        let err = rt
            .create_binding(
                &ctx,
                NewBinding::new(ScopeType::Trait, "editorial", "editorial.alt").with_priority(10),
            )
            .await
            .unwrap_err();
        assert_eq!(err.text_code(), "BINDING_CONFLICT");
        assert_eq!(err.metadata()["existing_binding_id"], b1.id.as_str());

        // Inactive duplicates are allowed
        rt.create_binding(
            &ctx,
            NewBinding::new(ScopeType::Trait, "editorial", "editorial.alt")
                .with_priority(10)
                .with_status(BindingStatus::Inactive),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_active_binding_requires_active_workflow() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("w", WorkflowStatus::Draft)).await.unwrap();

        let err = rt
            .create_binding(&ctx, NewBinding::global("w"))
            .await
            .unwrap_err();
        assert_eq!(err.metadata()["field"], "workflow_id");

        let err = rt
            .create_binding(&ctx, NewBinding::global("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        let inactive = rt
            .create_binding(&ctx, NewBinding::global("w").with_status(BindingStatus::Inactive))
            .await
            .unwrap();
        assert_eq!(inactive.scope_ref, "global");
    }

    #[tokio::test]
    async fn test_binding_update_and_delete() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("w", WorkflowStatus::Active)).await.unwrap();
        let b = rt.create_binding(&ctx, NewBinding::global("w")).await.unwrap();

        let updated = rt
            .update_binding(
                &ctx,
                &b.id,
                BindingUpdate {
                    priority: Some(5),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.priority, 5);

        let err = rt
            .update_binding(&ctx, &b.id, BindingUpdate::default(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.text_code(), "BINDING_VERSION_CONFLICT");

        rt.delete_binding(&ctx, &b.id).await.unwrap();
        assert!(rt.delete_binding(&ctx, &b.id).await.unwrap_err().is_not_found());
    }

    async fn resolved_workflow(rt: &WorkflowRuntime, query: &BindingQuery) -> String {
        rt.resolve_binding(&AdminContext::new(), query)
            .await
            .unwrap()
            .map(|r| r.workflow_id)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_resolution_through_store() {
        let rt = runtime();
        let ctx = AdminContext::new();
        for id in ["w_g", "w_t", "w_n"] {
            rt.create_workflow(&ctx, new_workflow(id, WorkflowStatus::Active)).await.unwrap();
        }
        rt.create_binding(&ctx, NewBinding::global("w_g").with_priority(100)).await.unwrap();
        let t = rt
            .create_binding(&ctx, NewBinding::new(ScopeType::Trait, "editorial", "w_t").with_priority(50))
            .await
            .unwrap();
        let n = rt
            .create_binding(&ctx, NewBinding::new(ScopeType::ContentType, "news", "w_n").with_priority(10))
            .await
            .unwrap();

        let query = BindingQuery::new("news").with_traits(["editorial"]);
        assert_eq!(resolved_workflow(&rt, &query).await, "w_n");
        rt.delete_binding(&ctx, &n.id).await.unwrap();
        assert_eq!(resolved_workflow(&rt, &query).await, "w_t");
        rt.delete_binding(&ctx, &t.id).await.unwrap();
        assert_eq!(resolved_workflow(&rt, &query).await, "w_g");
    }

    #[tokio::test]
    async fn test_engine_binding_tracks_activations() {
        let rt = runtime();
        let ctx = AdminContext::new();
        rt.create_workflow(&ctx, new_workflow("active.one", WorkflowStatus::Active)).await.unwrap();
        rt.create_workflow(&ctx, new_workflow("draft.one", WorkflowStatus::Draft)).await.unwrap();

        let engine = Arc::new(InMemoryWorkflowEngine::new());
        let count = rt.bind_workflow_engine(&ctx, engine.clone()).await.unwrap();
        assert_eq!(count, 1);
        assert!(engine.has_workflow("active.one").await);
        assert!(!engine.has_workflow("draft.one").await);

        rt.update_workflow(
            &ctx,
            "draft.one",
            WorkflowUpdate {
                status: Some(WorkflowStatus::Active),
                ..Default::default()
            },
            1,
        )
        .await
        .unwrap();
        assert!(engine.has_workflow("draft.one").await);
    }

    #[tokio::test]
    async fn test_cancelled_context_writes_nothing() {
        let rt = runtime();
        let ctx = AdminContext::new();
        ctx.cancellation_token().cancel();
        let err = rt
            .create_workflow(&ctx, new_workflow("w", WorkflowStatus::Draft))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Cancelled));
        let fresh = AdminContext::new();
        assert!(rt.list_workflows(&fresh, &WorkflowFilter::default()).await.unwrap().is_empty());
    }
}
