//! Binding resolution
//!
//! Tiers are tried in order: content type, then each trait in input order,
//! then global. Within a tier the sort key is environment-specific first,
//! then ascending priority, then `(scope_type, scope_ref, id)`.

use crate::binding::{ScopeType, WorkflowBinding};
use larch_types::normalize_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Resolution input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingQuery {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub environment: String,
}

impl BindingQuery {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

/// The binding that won resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBinding {
    pub workflow_id: String,
    pub binding_id: String,
    pub scope_type: ScopeType,
    pub scope_ref: String,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

impl From<&WorkflowBinding> for ResolvedBinding {
    fn from(binding: &WorkflowBinding) -> Self {
        Self {
            workflow_id: binding.workflow_id.clone(),
            binding_id: binding.id.clone(),
            scope_type: binding.scope_type,
            scope_ref: binding.scope_ref.clone(),
            priority: binding.priority,
            environment: binding.environment.clone(),
        }
    }
}

fn precedence(a: &WorkflowBinding, b: &WorkflowBinding) -> Ordering {
    a.environment
        .is_empty()
        .cmp(&b.environment.is_empty())
        .then(a.priority.cmp(&b.priority))
        .then_with(|| a.scope_type.cmp(&b.scope_type))
        .then_with(|| a.scope_ref.cmp(&b.scope_ref))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort bindings into resolution order.
pub fn sort_bindings(bindings: &mut [WorkflowBinding]) {
    bindings.sort_by(precedence);
}

/// Pick the winning binding from `bindings` for `query`.
///
/// Inactive bindings and bindings whose environment does not match are
/// ignored.
pub fn resolve(bindings: &[WorkflowBinding], query: &BindingQuery) -> Option<ResolvedBinding> {
    let environment = normalize_key(&query.environment);
    let mut candidates: Vec<&WorkflowBinding> = bindings
        .iter()
        .filter(|b| b.is_active() && b.matches_environment(&environment))
        .collect();
    candidates.sort_by(|a, b| precedence(a, b));

    let content_type = normalize_key(&query.content_type);
    if !content_type.is_empty() {
        if let Some(hit) = candidates
            .iter()
            .find(|b| b.scope_type == ScopeType::ContentType && b.scope_ref == content_type)
        {
            return Some(ResolvedBinding::from(*hit));
        }
    }

    for trait_name in &query.traits {
        let trait_name = normalize_key(trait_name);
        if trait_name.is_empty() {
            continue;
        }
        if let Some(hit) = candidates
            .iter()
            .find(|b| b.scope_type == ScopeType::Trait && b.scope_ref == trait_name)
        {
            return Some(ResolvedBinding::from(*hit));
        }
    }

    candidates
        .iter()
        .find(|b| b.scope_type == ScopeType::Global)
        .map(|b| ResolvedBinding::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingStatus, GLOBAL_SCOPE_REF};
    use chrono::Utc;
    use proptest::prelude::*;

    fn binding(id: &str, scope_type: ScopeType, scope_ref: &str, workflow: &str, priority: u32, env: &str) -> WorkflowBinding {
        let now = Utc::now();
        WorkflowBinding {
            id: id.into(),
            scope_type,
            scope_ref: if scope_type == ScopeType::Global {
                GLOBAL_SCOPE_REF.into()
            } else {
                scope_ref.into()
            },
            workflow_id: workflow.into(),
            priority,
            status: BindingStatus::Active,
            environment: env.into(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tier_precedence() {
        let mut bindings = vec![
            binding("g", ScopeType::Global, "", "w_g", 100, ""),
            binding("t", ScopeType::Trait, "editorial", "w_t", 50, ""),
            binding("n", ScopeType::ContentType, "news", "w_n", 10, ""),
        ];
        let query = BindingQuery::new("news").with_traits(["editorial"]);
        assert_eq!(resolve(&bindings, &query).unwrap().workflow_id, "w_n");

        bindings.retain(|b| b.id != "n");
        assert_eq!(resolve(&bindings, &query).unwrap().workflow_id, "w_t");

        bindings.retain(|b| b.id != "t");
        assert_eq!(resolve(&bindings, &query).unwrap().workflow_id, "w_g");

        bindings.clear();
        assert!(resolve(&bindings, &query).is_none());
    }

    #[test]
    fn test_traits_in_input_order() {
        let bindings = vec![
            binding("a", ScopeType::Trait, "seo", "w_seo", 1, ""),
            binding("b", ScopeType::Trait, "editorial", "w_ed", 50, ""),
        ];
        let query = BindingQuery::new("page").with_traits(["editorial", "seo"]);
        assert_eq!(resolve(&bindings, &query).unwrap().workflow_id, "w_ed");
    }

    #[test]
    fn test_environment_specific_beats_agnostic() {
        let bindings = vec![
            binding("any", ScopeType::Global, "", "w_any", 1, ""),
            binding("prod", ScopeType::Global, "", "w_prod", 90, "production"),
        ];
        let prod = BindingQuery::new("page").with_environment("Production");
        assert_eq!(resolve(&bindings, &prod).unwrap().workflow_id, "w_prod");

        let staging = BindingQuery::new("page").with_environment("staging");
        assert_eq!(resolve(&bindings, &staging).unwrap().workflow_id, "w_any");

        let none = BindingQuery::new("page");
        assert_eq!(resolve(&bindings, &none).unwrap().workflow_id, "w_any");
    }

    #[test]
    fn test_inactive_ignored() {
        let mut b = binding("n", ScopeType::ContentType, "news", "w_n", 1, "");
        b.status = BindingStatus::Inactive;
        let bindings = vec![b, binding("g", ScopeType::Global, "", "w_g", 1, "")];
        assert_eq!(
            resolve(&bindings, &BindingQuery::new("news")).unwrap().workflow_id,
            "w_g"
        );
    }

    fn arb_binding() -> impl Strategy<Value = WorkflowBinding> {
        (
            prop_oneof![
                Just(ScopeType::Global),
                Just(ScopeType::Trait),
                Just(ScopeType::ContentType)
            ],
            prop_oneof![Just("news"), Just("editorial"), Just("seo")],
            0u32..4,
            prop_oneof![Just(""), Just("production")],
            0u32..1000,
        )
            .prop_map(|(scope_type, scope_ref, priority, env, n)| {
                binding(
                    &format!("b{n}"),
                    scope_type,
                    scope_ref,
                    &format!("w{n}"),
                    priority,
                    env,
                )
            })
    }

    proptest! {
        #[test]
        fn prop_resolution_ignores_input_order(
            bindings in prop::collection::vec(arb_binding(), 0..12),
            env in prop_oneof![Just(""), Just("production"), Just("staging")],
        ) {
            let query = BindingQuery::new("news")
                .with_traits(["editorial", "seo"])
                .with_environment(env);
            let forward = resolve(&bindings, &query);
            let mut reversed = bindings.clone();
            reversed.reverse();
            prop_assert_eq!(forward.clone(), resolve(&reversed, &query));
            prop_assert_eq!(forward, resolve(&bindings, &query));
        }

        #[test]
        fn prop_content_type_tier_wins_when_present(
            bindings in prop::collection::vec(arb_binding(), 1..12),
        ) {
            let query = BindingQuery::new("news").with_traits(["editorial"]);
            let has_content_type = bindings
                .iter()
                .any(|b| b.scope_type == ScopeType::ContentType
                    && b.scope_ref == "news"
                    && b.environment.is_empty());
            if let Some(resolved) = resolve(&bindings, &query) {
                if has_content_type {
                    prop_assert_eq!(resolved.scope_type, ScopeType::ContentType);
                }
            } else {
                prop_assert!(!has_content_type);
            }
        }

        #[test]
        fn prop_lowest_priority_wins_within_tier(
            bindings in prop::collection::vec(arb_binding(), 1..12),
        ) {
            let query = BindingQuery::new("news");
            if let Some(resolved) = resolve(&bindings, &query) {
                let min = bindings
                    .iter()
                    .filter(|b| b.scope_type == resolved.scope_type
                        && b.scope_ref == resolved.scope_ref
                        && b.environment.is_empty())
                    .map(|b| b.priority)
                    .min();
                prop_assert_eq!(Some(resolved.priority), min);
            }
        }
    }
}
