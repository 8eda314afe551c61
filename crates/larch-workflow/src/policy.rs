//! Translation policy
//!
//! A policy can veto a workflow transition when required locales are
//! missing. The enforcer counts every veto once.

use crate::metrics::WorkflowMetrics;
use async_trait::async_trait;
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult, Record};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What a policy sees for one transition attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationPolicyInput {
    pub entity_type: String,
    pub entity_id: String,
    pub transition: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub requested_locale: String,
    #[serde(default)]
    pub metadata: Record,
}

/// Blocks transitions; `Err(MissingTranslations)` is a veto
#[async_trait]
pub trait TranslationPolicy: Send + Sync {
    async fn apply(&self, ctx: &AdminContext, input: &TranslationPolicyInput) -> AdminResult<()>;
}

/// Locales an entity already has
#[async_trait]
pub trait LocaleLookup: Send + Sync {
    async fn available_locales(
        &self,
        ctx: &AdminContext,
        entity_type: &str,
        entity_id: &str,
    ) -> AdminResult<Vec<String>>;
}

/// Requires a fixed locale set for selected transitions.
///
/// Requirements are keyed by environment; the empty key applies when the
/// environment has no entry of its own.
pub struct RequiredLocalesPolicy {
    transitions: HashSet<String>,
    required: HashMap<String, Vec<String>>,
    lookup: Arc<dyn LocaleLookup>,
}

impl RequiredLocalesPolicy {
    pub fn new(lookup: Arc<dyn LocaleLookup>) -> Self {
        Self {
            transitions: HashSet::new(),
            required: HashMap::new(),
            lookup,
        }
    }

    pub fn for_transition(mut self, transition: &str) -> Self {
        self.transitions.insert(normalize_key(transition));
        self
    }

    pub fn require(mut self, environment: &str, locales: &[&str]) -> Self {
        self.required.insert(
            normalize_key(environment),
            locales.iter().map(|l| normalize_key(l)).collect(),
        );
        self
    }

    fn required_for(&self, environment: &str) -> &[String] {
        self.required
            .get(environment)
            .or_else(|| self.required.get(""))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl TranslationPolicy for RequiredLocalesPolicy {
    async fn apply(&self, ctx: &AdminContext, input: &TranslationPolicyInput) -> AdminResult<()> {
        if !self.transitions.contains(&normalize_key(&input.transition)) {
            return Ok(());
        }
        let required = self.required_for(&normalize_key(&input.environment));
        if required.is_empty() {
            return Ok(());
        }

        let available: HashSet<String> = self
            .lookup
            .available_locales(ctx, &input.entity_type, &input.entity_id)
            .await?
            .iter()
            .map(|l| normalize_key(l))
            .collect();
        let missing: Vec<String> = required
            .iter()
            .filter(|l| !available.contains(*l))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdminError::MissingTranslations {
                entity_type: input.entity_type.clone(),
                entity_id: input.entity_id.clone(),
                transition: input.transition.clone(),
                environment: input.environment.clone(),
                requested_locale: input.requested_locale.clone(),
                missing_locales: missing,
            })
        }
    }
}

/// Runs the configured policy and records blocked transitions
#[derive(Clone)]
pub struct PolicyEnforcer {
    policy: Option<Arc<dyn TranslationPolicy>>,
    metrics: WorkflowMetrics,
}

impl PolicyEnforcer {
    pub fn new(metrics: WorkflowMetrics) -> Self {
        Self {
            policy: None,
            metrics,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn TranslationPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    /// Apply the policy; a missing-translations veto bumps the blocked counter.
    pub async fn check(&self, ctx: &AdminContext, input: &TranslationPolicyInput) -> AdminResult<()> {
        let Some(policy) = &self.policy else {
            return Ok(());
        };
        match policy.apply(ctx, input).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if let AdminError::MissingTranslations { missing_locales, .. } = err.root() {
                    self.metrics.record_blocked(
                        &input.entity_type,
                        &input.transition,
                        &input.requested_locale,
                        &input.environment,
                    );
                    tracing::warn!(
                        entity = %input.entity_type,
                        entity_id = %input.entity_id,
                        transition = %input.transition,
                        locale = %input.requested_locale,
                        environment = %input.environment,
                        missing_locales = ?missing_locales,
                        "Workflow transition blocked by missing translations"
                    );
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEnforcer")
            .field("has_policy", &self.policy.is_some())
            .finish()
    }
}
