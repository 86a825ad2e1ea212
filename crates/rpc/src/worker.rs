//! Per-queue polling thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use crate::context::ExecutionContext;
use crate::registry::CallRegistry;
use crate::transport::{CompletionEvent, CompletionQueue, PollOutcome};

/// Bound on each wait so the loop periodically observes the shutdown
/// flag even when the queue fails to report closure promptly.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One polling thread draining exactly one completion queue.
pub(crate) struct PollingWorker {
	thread: JoinHandle<()>,
}

impl PollingWorker {
	/// Spawns the worker thread for polling slot `index`.
	pub fn spawn<Q: CompletionQueue>(
		index: usize,
		queue: Arc<Q>,
		registry: Arc<CallRegistry>,
		context: Arc<dyn ExecutionContext>,
		shutdown: Arc<AtomicBool>,
	) -> std::io::Result<Self> {
		let thread = std::thread::Builder::new()
			.name(format!("rpc-poll-{index}"))
			.spawn(move || {
				poll_loop(index, queue.as_ref(), &registry, context.as_ref(), &shutdown);
			})?;
		Ok(Self { thread })
	}

	/// Blocks until the worker thread exits.
	pub fn join(self) {
		let _ = self.thread.join();
	}
}

/// Drains one queue until it closes or shutdown is observed.
fn poll_loop(
	index: usize,
	queue: &dyn CompletionQueue,
	registry: &CallRegistry,
	context: &dyn ExecutionContext,
	shutdown: &AtomicBool,
) {
	trace!(slot = index, "rpc.poll.start");
	loop {
		match queue.poll(POLL_INTERVAL) {
			PollOutcome::Closed => break,
			// Secondary termination condition, independent of Closed:
			// some transports do not report closure promptly once
			// shutdown has begun.
			PollOutcome::Timeout if shutdown.load(Ordering::Acquire) => break,
			PollOutcome::Timeout => {}
			PollOutcome::Event(event) => handle_completion(event, registry, context, shutdown),
		}
	}
	debug!(slot = index, "rpc.poll.stop");
}

/// Finalizes one completed call and hands it to the execution context,
/// or drops it on the teardown-race path.
fn handle_completion(
	event: CompletionEvent,
	registry: &CallRegistry,
	context: &dyn ExecutionContext,
	shutdown: &AtomicBool,
) {
	let token = event.token;
	let serviced = event.serviced;
	let Some(mut call) = registry.claim(token) else {
		crate::fatal!("completion for unknown call token {}", token.0);
	};
	call.finalize(event);
	let Some(stats) = call.stats_handle() else {
		crate::fatal!("call token {} completed without a stats handle", token.0);
	};
	if serviced && !context.is_stopped() && !shutdown.load(Ordering::Acquire) {
		context.post(Box::new(move || call.deliver()), stats);
	} else {
		// Spurious wakeup, stopped context, or shutdown in progress:
		// the call is discarded without invoking its callback.
		trace!(token = token.0, "rpc.call.discard");
	}
}
