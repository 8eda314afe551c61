//! In-memory workflow store
//!
//! Workflows, revisions and bindings share one lock so that a workflow
//! write and its revision row, or a binding write and its uniqueness scan,
//! happen under a single lock scope.

use crate::binding::{BindingFilter, WorkflowBinding};
use crate::definition::{PersistedWorkflow, WorkflowFilter, WorkflowRevision};
use crate::store::{WorkflowBindingStore, WorkflowDefinitionStore};
use async_trait::async_trait;
use larch_types::{apply_expected_version, AdminContext, AdminError, AdminResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    workflows: HashMap<String, PersistedWorkflow>,
    revisions: BTreeMap<(String, u64), WorkflowRevision>,
    bindings: HashMap<String, WorkflowBinding>,
}

impl State {
    fn check_reference(&self, binding: &WorkflowBinding) -> AdminResult<()> {
        let workflow = self.workflows.get(&binding.workflow_id).ok_or_else(|| {
            AdminError::validation(
                "workflow_id",
                format!("workflow {} does not exist", binding.workflow_id),
            )
        })?;
        if binding.is_active() && !workflow.is_active() {
            return Err(AdminError::validation(
                "workflow_id",
                format!(
                    "workflow {} is {}; active bindings require an active workflow",
                    workflow.id, workflow.status
                ),
            ));
        }
        Ok(())
    }

    fn check_active_unique(&self, binding: &WorkflowBinding) -> AdminResult<()> {
        match self.bindings.values().find(|existing| existing.collides_with(binding)) {
            Some(existing) => Err(existing.conflict_error()),
            None => Ok(()),
        }
    }
}

/// Reference store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowDefinitionStore for InMemoryWorkflowStore {
    async fn insert_workflow(&self, ctx: &AdminContext, workflow: PersistedWorkflow) -> AdminResult<PersistedWorkflow> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        if state.workflows.contains_key(&workflow.id) {
            return Err(AdminError::already_exists("workflow", &workflow.id));
        }
        state
            .revisions
            .insert((workflow.id.clone(), workflow.version), workflow.revision());
        state.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    async fn replace_workflow(
        &self,
        ctx: &AdminContext,
        mut workflow: PersistedWorkflow,
        expected_version: u64,
    ) -> AdminResult<PersistedWorkflow> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        let current = state
            .workflows
            .get(&workflow.id)
            .ok_or_else(|| AdminError::not_found("workflow", &workflow.id))?;

        apply_expected_version(current, &mut workflow, expected_version, |m| {
            AdminError::WorkflowVersionConflict {
                workflow_id: current.id.clone(),
                expected_version: m.expected,
                actual_version: m.actual,
            }
        })?;
        workflow.created_at = current.created_at;

        state
            .revisions
            .insert((workflow.id.clone(), workflow.version), workflow.revision());
        state.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    async fn get_workflow(&self, ctx: &AdminContext, id: &str) -> AdminResult<PersistedWorkflow> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        state
            .workflows
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found("workflow", id))
    }

    async fn list_workflows(&self, ctx: &AdminContext, filter: &WorkflowFilter) -> AdminResult<Vec<PersistedWorkflow>> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        let mut workflows: Vec<PersistedWorkflow> = state
            .workflows
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workflows)
    }

    async fn get_revision(&self, ctx: &AdminContext, id: &str, version: u64) -> AdminResult<WorkflowRevision> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        state
            .revisions
            .get(&(id.to_string(), version))
            .cloned()
            .ok_or_else(|| AdminError::not_found("workflow revision", format!("{id}@{version}")))
    }

    async fn list_revisions(&self, ctx: &AdminContext, id: &str) -> AdminResult<Vec<WorkflowRevision>> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        if !state.workflows.contains_key(id) {
            return Err(AdminError::not_found("workflow", id));
        }
        Ok(state
            .revisions
            .range((id.to_string(), 0)..=(id.to_string(), u64::MAX))
            .map(|(_, revision)| revision.clone())
            .collect())
    }
}

#[async_trait]
impl WorkflowBindingStore for InMemoryWorkflowStore {
    async fn insert_binding(&self, ctx: &AdminContext, binding: WorkflowBinding) -> AdminResult<WorkflowBinding> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        if state.bindings.contains_key(&binding.id) {
            return Err(AdminError::already_exists("workflow binding", &binding.id));
        }
        state.check_reference(&binding)?;
        state.check_active_unique(&binding)?;
        state.bindings.insert(binding.id.clone(), binding.clone());
        Ok(binding)
    }

    async fn replace_binding(
        &self,
        ctx: &AdminContext,
        mut binding: WorkflowBinding,
        expected_version: u64,
    ) -> AdminResult<WorkflowBinding> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        let current = state
            .bindings
            .get(&binding.id)
            .ok_or_else(|| AdminError::not_found("workflow binding", &binding.id))?;

        apply_expected_version(current, &mut binding, expected_version, |m| {
            AdminError::BindingVersionConflict {
                binding_id: current.id.clone(),
                expected_version: m.expected,
                actual_version: m.actual,
            }
        })?;
        binding.created_at = current.created_at;

        state.check_reference(&binding)?;
        state.check_active_unique(&binding)?;
        state.bindings.insert(binding.id.clone(), binding.clone());
        Ok(binding)
    }

    async fn delete_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        ctx.ensure_active()?;
        let mut state = self.state.write().await;
        state
            .bindings
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AdminError::not_found("workflow binding", id))
    }

    async fn get_binding(&self, ctx: &AdminContext, id: &str) -> AdminResult<WorkflowBinding> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        state
            .bindings
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found("workflow binding", id))
    }

    async fn list_bindings(&self, ctx: &AdminContext, filter: &BindingFilter) -> AdminResult<Vec<WorkflowBinding>> {
        ctx.ensure_active()?;
        let state = self.state.read().await;
        let mut bindings: Vec<WorkflowBinding> = state
            .bindings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bindings.sort_by(|a, b| {
            (a.scope_type, &a.scope_ref, a.priority, &a.id).cmp(&(b.scope_type, &b.scope_ref, b.priority, &b.id))
        });
        Ok(bindings)
    }
}
