//! Transport collaborator interfaces: submission stubs, completion
//! queues, and per-call context.
//!
//! Wire encoding and stub codegen belong to the transport; this crate
//! only sees type-erased requests and replies plus the raw status.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::status::TransportStatus;

/// Opaque completion tag identifying one outstanding call.
///
/// Issued by the dispatcher at submission time and returned unchanged
/// by the completion queue when the call finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(pub u64);

/// Identifies one RPC method on a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
	/// Service name.
	pub service: &'static str,
	/// Method name within the service.
	pub method: &'static str,
}

impl MethodDescriptor {
	/// Creates a descriptor for `service`/`method`.
	#[must_use]
	pub const fn new(service: &'static str, method: &'static str) -> Self {
		Self { service, method }
	}
}

/// Outgoing metadata key under which the cluster identity travels.
pub const CLUSTER_ID_KEY: &str = "cluster-id";

/// Per-call context handed to the transport at submission.
///
/// Built once at call creation and never mutated afterward. The
/// deadline is absolute so a delayed submission cannot stretch it.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
	deadline: Option<Instant>,
	metadata: Vec<(&'static str, String)>,
}

impl CallContext {
	/// Creates a context whose deadline is now + `timeout`, or no
	/// deadline at all for `None`.
	#[must_use]
	pub fn new(timeout: Option<Duration>) -> Self {
		Self {
			deadline: timeout.map(|timeout| Instant::now() + timeout),
			metadata: Vec::new(),
		}
	}

	/// Attaches one outgoing metadata pair.
	pub fn add_metadata(&mut self, key: &'static str, value: String) {
		self.metadata.push((key, value));
	}

	/// Absolute deadline, if any.
	#[must_use]
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Outgoing metadata pairs, in attachment order.
	#[must_use]
	pub fn metadata(&self) -> &[(&'static str, String)] {
		&self.metadata
	}
}

/// Completion notification for one previously submitted call.
pub struct CompletionEvent {
	/// Tag supplied at submission.
	pub token: CallToken,
	/// True when the request was genuinely serviced. A spurious or
	/// cancelled wakeup carries `false` and its call is dropped
	/// without callback delivery.
	pub serviced: bool,
	/// Raw status written by the transport.
	pub status: TransportStatus,
	/// Reply payload written by the transport. Its concrete type must
	/// match the reply type the call was created with; `None` is
	/// common on failure paths.
	pub payload: Option<Box<dyn Any + Send>>,
}

/// Outcome of one bounded wait on a completion queue.
pub enum PollOutcome {
	/// A previously submitted call completed.
	Event(CompletionEvent),
	/// The wait elapsed without a completion.
	Timeout,
	/// The queue was closed; no further events will be reported.
	Closed,
}

/// The transport's completion notification mechanism.
///
/// Exactly one polling thread waits on each queue. `close` may be
/// invoked from any thread; blocked and future polls must then drain
/// and report [`PollOutcome::Closed`].
pub trait CompletionQueue: Send + Sync + 'static {
	/// Waits up to `timeout` for the next completion.
	fn poll(&self, timeout: Duration) -> PollOutcome;

	/// Closes the queue.
	fn close(&self);
}

/// A transport-level stub bound to one remote service.
///
/// `submit` must not block and must not fail: transport-level problems
/// surface later as a failure status on the completion queue. The
/// transport enforces the context's deadline itself and reports it
/// through the same completion path as a normal reply.
pub trait Stub: Send + Sync {
	/// Completion queue type this stub reports on.
	type Queue: CompletionQueue;

	/// Submits one request whose eventual completion carries `token`.
	fn submit(
		&self,
		method: &MethodDescriptor,
		request: Box<dyn Any + Send>,
		context: CallContext,
		queue: &Arc<Self::Queue>,
		token: CallToken,
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deadline_is_absolute_from_construction() {
		let before = Instant::now();
		let context = CallContext::new(Some(Duration::from_millis(500)));
		let deadline = context.deadline().unwrap();
		assert!(deadline >= before + Duration::from_millis(500));
		assert!(deadline <= Instant::now() + Duration::from_millis(500));
	}

	#[test]
	fn no_timeout_means_no_deadline() {
		assert!(CallContext::new(None).deadline().is_none());
	}

	#[test]
	fn metadata_preserves_attachment_order() {
		let mut context = CallContext::new(None);
		context.add_metadata(CLUSTER_ID_KEY, "aa".into());
		context.add_metadata("trace-id", "bb".into());
		let keys: Vec<_> = context.metadata().iter().map(|(key, _)| *key).collect();
		assert_eq!(keys, [CLUSTER_ID_KEY, "trace-id"]);
	}
}
