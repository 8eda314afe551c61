//! Workflow metrics

use larch_types::{AdminError, AdminResult};
use prometheus::{IntCounterVec, Opts, Registry};

/// Counters for workflow policy outcomes
#[derive(Clone, Debug)]
pub struct WorkflowMetrics {
    /// Transitions blocked by the translation policy
    pub blocked_transitions_total: IntCounterVec,
}

impl WorkflowMetrics {
    /// Create and register workflow metrics
    pub fn new(registry: &Registry) -> AdminResult<Self> {
        let blocked_transitions_total = IntCounterVec::new(
            Opts::new(
                "larch_workflow_blocked_transitions_total",
                "Workflow transitions blocked by missing translations",
            ),
            &["entity", "transition", "locale", "environment"],
        )
        .map_err(|e| AdminError::internal(format!("create blocked_transitions_total: {e}")))?;
        registry
            .register(Box::new(blocked_transitions_total.clone()))
            .map_err(|e| AdminError::internal(format!("register blocked_transitions_total: {e}")))?;

        Ok(Self {
            blocked_transitions_total,
        })
    }

    pub fn record_blocked(&self, entity: &str, transition: &str, locale: &str, environment: &str) {
        self.blocked_transitions_total
            .with_label_values(&[entity, transition, locale, environment])
            .inc();
    }

    pub fn blocked_count(&self, entity: &str, transition: &str, locale: &str, environment: &str) -> u64 {
        self.blocked_transitions_total
            .with_label_values(&[entity, transition, locale, environment])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let metrics = WorkflowMetrics::new(&registry).unwrap();
        metrics.record_blocked("pages", "publish", "en", "production");
        assert_eq!(metrics.blocked_count("pages", "publish", "en", "production"), 1);
        assert_eq!(metrics.blocked_count("pages", "publish", "es", "production"), 0);

        // Same name twice on one registry fails
        assert!(WorkflowMetrics::new(&registry).is_err());
    }
}
