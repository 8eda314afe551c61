//! Larch Workflow
//!
//! Two layers:
//!
//! - the engine ([`InMemoryWorkflowEngine`]): an in-memory state machine that
//!   validates `(current_state, transition)` pairs against a registered
//!   definition and reports the target state
//! - the runtime ([`WorkflowRuntime`]): persisted, versioned workflow
//!   definitions with revision snapshots and rollback, plus bindings that
//!   attach a workflow to a global, trait or content-type scope
//!
//! Binding resolution is a pure function ([`resolution::resolve`]) over the
//! active binding set. Translation policies can block transitions; every
//! block is counted in `larch_workflow_blocked_transitions_total`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod binding;
pub mod definition;
pub mod engine;
pub mod memory;
pub mod metrics;
pub mod policy;
pub mod resolution;
pub mod runtime;
pub mod store;

pub use binding::{
    BindingFilter, BindingStatus, BindingUpdate, NewBinding, ScopeType, WorkflowBinding,
    GLOBAL_SCOPE_REF,
};
pub use definition::{
    NewWorkflow, PersistedWorkflow, WorkflowDefinition, WorkflowFilter, WorkflowRevision,
    WorkflowStatus, WorkflowTransition, WorkflowUpdate,
};
pub use engine::{
    InMemoryWorkflowEngine, TransitionInput, TransitionResult, WorkflowEngine, WorkflowRegistrar,
};
pub use memory::InMemoryWorkflowStore;
pub use metrics::WorkflowMetrics;
pub use policy::{
    LocaleLookup, PolicyEnforcer, RequiredLocalesPolicy, TranslationPolicy, TranslationPolicyInput,
};
pub use resolution::{BindingQuery, ResolvedBinding};
pub use runtime::WorkflowRuntime;
pub use store::{WorkflowBindingStore, WorkflowDefinitionStore, WorkflowStore};
