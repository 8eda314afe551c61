//! In-memory workflow engine
//!
//! Holds one definition per entity type behind a read-write lock.
//! Transitions are pure over the definition; applying the new state to the
//! entity is the caller's job.

use crate::definition::{WorkflowDefinition, WorkflowTransition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A requested transition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionInput {
    pub entity_id: String,
    pub entity_type: String,
    pub current_state: String,
    pub transition: String,
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub metadata: Record,
}

/// Outcome of a successful transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub from_state: String,
    pub to_state: String,
    pub completed_at: DateTime<Utc>,
    pub actor_id: String,
    #[serde(default)]
    pub metadata: Record,
}

/// Accepts `(entity_type, definition)` registrations
#[async_trait]
pub trait WorkflowRegistrar: Send + Sync {
    async fn register_workflow(&self, entity_type: &str, definition: WorkflowDefinition) -> AdminResult<()>;
}

/// State machine evaluation
#[async_trait]
pub trait WorkflowEngine: WorkflowRegistrar {
    async fn has_workflow(&self, entity_type: &str) -> bool;

    /// Definition registered for `entity_type`
    async fn definition(&self, entity_type: &str) -> Option<WorkflowDefinition>;

    async fn transition(&self, ctx: &AdminContext, input: TransitionInput) -> AdminResult<TransitionResult>;

    async fn available_transitions(
        &self,
        ctx: &AdminContext,
        entity_type: &str,
        state: &str,
    ) -> AdminResult<Vec<WorkflowTransition>>;
}

/// Definition map guarded by a read-write lock
#[derive(Debug, Default)]
pub struct InMemoryWorkflowEngine {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the definition registered for `entity_type`.
    pub async fn unregister_workflow(&self, entity_type: &str) -> Option<WorkflowDefinition> {
        let removed = self
            .definitions
            .write()
            .await
            .remove(&normalize_key(entity_type));
        if removed.is_some() {
            tracing::info!(entity_type = %entity_type, "Workflow definition removed");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.definitions.read().await.len()
    }
}

#[async_trait]
impl WorkflowRegistrar for InMemoryWorkflowEngine {
    async fn register_workflow(&self, entity_type: &str, mut definition: WorkflowDefinition) -> AdminResult<()> {
        let key = normalize_key(entity_type);
        if key.is_empty() {
            return Err(AdminError::validation("entity_type", "entity type is required"));
        }
        definition.normalize();
        definition.validate()?;

        self.definitions.write().await.insert(key.clone(), definition);
        tracing::info!(entity_type = %key, "Workflow definition registered");
        Ok(())
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn has_workflow(&self, entity_type: &str) -> bool {
        self.definitions
            .read()
            .await
            .contains_key(&normalize_key(entity_type))
    }

    async fn definition(&self, entity_type: &str) -> Option<WorkflowDefinition> {
        self.definitions
            .read()
            .await
            .get(&normalize_key(entity_type))
            .cloned()
    }

    async fn transition(&self, ctx: &AdminContext, input: TransitionInput) -> AdminResult<TransitionResult> {
        ctx.ensure_active()?;
        let key = normalize_key(&input.entity_type);
        let definitions = self.definitions.read().await;
        let definition = definitions
            .get(&key)
            .ok_or_else(|| AdminError::WorkflowNotFound(input.entity_type.clone()))?;

        let current = input.current_state.trim();
        let state = if current.is_empty() {
            definition.initial_state.as_str()
        } else {
            current
        };
        let matched = definition
            .find_transition(state, &input.transition)
            .ok_or_else(|| AdminError::InvalidTransition {
                entity_type: input.entity_type.clone(),
                from_state: state.to_string(),
                transition: input.transition.clone(),
            })?;

        tracing::debug!(
            entity_type = %key,
            entity_id = %input.entity_id,
            transition = %matched.name,
            from = %state,
            to = %matched.to,
            "Workflow transition"
        );

        Ok(TransitionResult {
            from_state: state.to_string(),
            to_state: matched.to.clone(),
            completed_at: Utc::now(),
            actor_id: input.actor_id,
            metadata: input.metadata,
        })
    }

    async fn available_transitions(
        &self,
        ctx: &AdminContext,
        entity_type: &str,
        state: &str,
    ) -> AdminResult<Vec<WorkflowTransition>> {
        ctx.ensure_active()?;
        let definitions = self.definitions.read().await;
        let definition = definitions
            .get(&normalize_key(entity_type))
            .ok_or_else(|| AdminError::WorkflowNotFound(entity_type.to_string()))?;
        let state = if state.trim().is_empty() {
            definition.initial_state.as_str()
        } else {
            state.trim()
        };
        Ok(definition.transitions_from(state).cloned().collect())
    }
}
