//! Larch Translation Queue
//!
//! Translation assignments move through
//! `pending -> assigned -> in_progress -> review -> {approved, rejected}`,
//! then `approved -> published`. `rejected` goes back to `in_progress` or
//! is archived; every non-terminal status may be archived.
//!
//! Every mutation carries the version the caller last saw. Among
//! non-terminal assignments the `(group, entity_type, source_locale,
//! target_locale)` key is unique.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod commands;
pub mod model;
pub mod queue;
pub mod store;

pub use commands::{register_queue_commands, QueueCommands};
pub use model::{
    AssignmentAction, AssignmentFilter, AssignmentPriority, AssignmentStatus, AssignmentType, BulkAssignmentAction,
    BulkFailure, BulkOutcome, BulkTarget, NewAssignment, TranslationAssignment, UniquenessKey,
};
pub use queue::{QueueOperation, TranslationQueue};
pub use store::{AssignmentStore, InMemoryAssignmentStore};
