//! Command bus bindings for the translation queue
//!
//! Each lifecycle operation gets a payload newtype so the bus can address
//! it by type, and a `translation.queue.*` name for by-name dispatch.

use crate::model::{
    AssignmentAction, AssignmentFilter, BulkAssignmentAction, BulkOutcome, NewAssignment, TranslationAssignment,
};
use crate::queue::{QueueOperation, TranslationQueue};
use async_trait::async_trait;
use larch_command::{CommandBus, QueryHandler};
use larch_types::{AdminContext, AdminResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name prefix shared by every queue command
pub const COMMAND_PREFIX: &str = "translation.queue";

/// Query handler set wrapping one [`TranslationQueue`]
#[derive(Clone)]
pub struct QueueCommands {
    queue: Arc<TranslationQueue>,
}

impl QueueCommands {
    pub fn new(queue: Arc<TranslationQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<TranslationQueue> {
        &self.queue
    }
}

macro_rules! queue_commands {
    ($($single:ident, $bulk:ident => $op:expr;)+) => {
        $(
            #[derive(Debug, Clone, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $single(pub AssignmentAction);

            #[derive(Debug, Clone, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $bulk(pub BulkAssignmentAction);

            #[async_trait]
            impl QueryHandler<$single, TranslationAssignment> for QueueCommands {
                async fn query(&self, ctx: &AdminContext, input: $single) -> AdminResult<TranslationAssignment> {
                    self.queue.execute(ctx, $op, input.0).await
                }
            }

            #[async_trait]
            impl QueryHandler<$bulk, Vec<BulkOutcome>> for QueueCommands {
                async fn query(&self, ctx: &AdminContext, input: $bulk) -> AdminResult<Vec<BulkOutcome>> {
                    self.queue.execute_bulk(ctx, $op, input.0).await
                }
            }
        )+

        async fn register_operations(bus: &CommandBus, handlers: &QueueCommands) -> AdminResult<()> {
            $(
                let op: QueueOperation = $op;
                bus.register_named_query::<$single, TranslationAssignment, _>(
                    &format!("{COMMAND_PREFIX}.{op}"),
                    handlers.clone(),
                )
                .await?;
                bus.register_named_query::<$bulk, Vec<BulkOutcome>, _>(
                    &format!("{COMMAND_PREFIX}.bulk_{op}"),
                    handlers.clone(),
                )
                .await?;
            )+
            Ok(())
        }
    };
}

queue_commands! {
    ClaimAssignment, BulkClaimAssignments => QueueOperation::Claim;
    AssignAssignment, BulkAssignAssignments => QueueOperation::Assign;
    ReleaseAssignment, BulkReleaseAssignments => QueueOperation::Release;
    SubmitAssignmentReview, BulkSubmitAssignmentReviews => QueueOperation::SubmitReview;
    ApproveAssignment, BulkApproveAssignments => QueueOperation::Approve;
    RejectAssignment, BulkRejectAssignments => QueueOperation::Reject;
    PublishAssignment, BulkPublishAssignments => QueueOperation::Publish;
    ArchiveAssignment, BulkArchiveAssignments => QueueOperation::Archive;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreateAssignment(pub NewAssignment);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListAssignments(pub AssignmentFilter);

#[async_trait]
impl QueryHandler<CreateAssignment, TranslationAssignment> for QueueCommands {
    async fn query(&self, ctx: &AdminContext, input: CreateAssignment) -> AdminResult<TranslationAssignment> {
        self.queue.create(ctx, input.0).await
    }
}

#[async_trait]
impl QueryHandler<ListAssignments, Vec<TranslationAssignment>> for QueueCommands {
    async fn query(&self, ctx: &AdminContext, input: ListAssignments) -> AdminResult<Vec<TranslationAssignment>> {
        self.queue.list(ctx, &input.0).await
    }
}

/// Register every queue command on `bus`.
///
/// Names are `translation.queue.<op>` and `translation.queue.bulk_<op>`,
/// plus `translation.queue.create` and `translation.queue.list`.
pub async fn register_queue_commands(bus: &CommandBus, queue: Arc<TranslationQueue>) -> AdminResult<()> {
    let handlers = QueueCommands::new(queue);
    bus.register_named_query::<CreateAssignment, TranslationAssignment, _>(
        &format!("{COMMAND_PREFIX}.create"),
        handlers.clone(),
    )
    .await?;
    bus.register_named_query::<ListAssignments, Vec<TranslationAssignment>, _>(
        &format!("{COMMAND_PREFIX}.list"),
        handlers.clone(),
    )
    .await?;
    register_operations(bus, &handlers).await?;
    tracing::debug!(prefix = COMMAND_PREFIX, "Translation queue commands registered");
    Ok(())
}
