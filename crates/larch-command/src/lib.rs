//! Larch Command Bus
//!
//! Commands are addressed two ways:
//!
//! - typed: `bus.dispatch::<T>(ctx, payload)` finds the handler registered
//!   for exactly `T`
//! - by name: `bus.dispatch_by_name(ctx, "translation.queue.claim", map)`
//!   rebuilds a typed payload from a record and runs the typed handler
//!
//! Queries return a value; a name-bound query serializes its output so a
//! by-name caller receives the same result as a typed caller.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod bus;
pub mod handler;

pub use bus::CommandBus;
pub use handler::{CommandHandler, QueryHandler};
