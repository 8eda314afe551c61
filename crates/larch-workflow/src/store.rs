//! Workflow storage traits
//!
//! Any backend must write an entity together with its derived rows (the
//! revision for a workflow write, the uniqueness check for a binding write)
//! in one atomic step.

use crate::binding::{BindingFilter, WorkflowBinding};
use crate::definition::{PersistedWorkflow, WorkflowFilter, WorkflowRevision};
use async_trait::async_trait;
use larch_types::{AdminContext, AdminResult};

/// Persisted workflows and their revisions
#[async_trait]
pub trait WorkflowDefinitionStore: Send + Sync {
    /// Insert a new workflow and its first revision.
    async fn insert_workflow(&self, ctx: &AdminContext, workflow: PersistedWorkflow) -> AdminResult<PersistedWorkflow>;

    /// Replace a workflow if its stored version equals `expected_version`.
    ///
    /// The stored copy gets `expected_version + 1` and a matching revision.
    async fn replace_workflow(
        &self,
        ctx: &AdminContext,
        workflow: PersistedWorkflow,
        expected_version: u64,
    ) -> AdminResult<PersistedWorkflow>;

    async fn get_workflow(&self, ctx: &AdminContext, id: &str) -> AdminResult<PersistedWorkflow>;

    async fn list_workflows(&self, ctx: &AdminContext, filter: &WorkflowFilter) -> AdminResult<Vec<PersistedWorkflow>>;

    async fn get_revision(&self, ctx: &AdminContext, id: &str, version: u64) -> AdminResult<WorkflowRevision>;

    /// All revisions in ascending version order
    async fn list_revisions(&self, ctx: &AdminContext, id: &str) -> AdminResult<Vec<WorkflowRevision>>;
}

/// Workflow bindings
#[async_trait]
pub trait WorkflowBindingStore: Send + Sync {
    /// Insert a binding after checking the workflow reference and active-uniqueness.
    async fn insert_binding(&self, ctx: &AdminContext, binding: WorkflowBinding) -> AdminResult<WorkflowBinding>;

    async fn replace_binding(
        &self,
        ctx: &AdminContext,
        binding: WorkflowBinding,
        expected_version: u64,
    ) -> AdminResult<WorkflowBinding>;

    async fn delete_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<()>;

    async fn get_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<WorkflowBinding>;

    async fn list_bindings(&self, ctx: &AdminContext, filter: &BindingFilter) -> AdminResult<Vec<WorkflowBinding>>;
}

/// Combined workflow storage
pub trait WorkflowStore: WorkflowDefinitionStore + WorkflowBindingStore + Send + Sync {}

impl<T> WorkflowStore for T where T: WorkflowDefinitionStore + WorkflowBindingStore + Send + Sync {}
