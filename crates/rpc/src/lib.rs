//! Asynchronous RPC client call manager.
//!
//! Sits between application code issuing outgoing remote calls and a
//! non-blocking transport that reports completions through pollable
//! queues. The crate owns the full lifecycle of every outstanding
//! call:
//! * [`CallDispatcher`]: call creation, round-robin queue routing, shutdown
//! * [`TypedCall`]: per-call state with at-most-once callback delivery
//! * polling workers: one bounded-wait drain loop per completion queue
//! * [`SerialContext`]: single-threaded delivery of user callbacks
//!
//! The transport, execution context, and stats subsystem are
//! collaborator traits ([`Stub`], [`CompletionQueue`],
//! [`ExecutionContext`], [`StatsRecorder`]); wire encoding, retries,
//! and endpoint selection belong to those layers, not here.

#![warn(missing_docs)]

pub mod call;
pub mod cluster;
pub mod context;
pub mod dispatcher;
mod fatal;
mod registry;
pub mod stats;
pub mod status;
pub mod transport;
mod worker;

pub use call::{Call, CallCallback, TypedCall};
pub use cluster::ClusterId;
pub use context::{DeliveryTask, ExecutionContext, SerialContext};
pub use dispatcher::{CallDispatcher, DispatcherOptions};
pub use stats::{StatsHandle, StatsRecorder, TracingStats};
pub use status::{CallError, CallStatus, TransportCode, TransportStatus};
pub use transport::{
	CLUSTER_ID_KEY, CallContext, CallToken, CompletionEvent, CompletionQueue, MethodDescriptor,
	PollOutcome, Stub,
};
