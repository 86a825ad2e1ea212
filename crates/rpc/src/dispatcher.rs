//! Outgoing-call manager: creation, round-robin routing, shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::call::{CallCallback, TypedCall};
use crate::cluster::{ClusterId, ClusterIdCell};
use crate::context::ExecutionContext;
use crate::registry::CallRegistry;
use crate::stats::StatsRecorder;
use crate::transport::{CLUSTER_ID_KEY, CallContext, CallToken, CompletionQueue, MethodDescriptor, Stub};
use crate::worker::PollingWorker;

/// Construction options for [`CallDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
	/// Number of completion queues and polling threads.
	pub polling_threads: usize,
	/// Default per-call timeout applied when a call carries no
	/// override; `None` means no deadline.
	pub default_timeout: Option<Duration>,
	/// Cluster identity known at construction, if any.
	pub cluster_id: Option<ClusterId>,
}

impl Default for DispatcherOptions {
	fn default() -> Self {
		Self {
			polling_threads: 1,
			default_timeout: None,
			cluster_id: None,
		}
	}
}

/// Manages the lifecycle of every outstanding outgoing call.
///
/// Calls are routed round-robin across a fixed pool of completion
/// queues, each drained by its own polling thread; completions are
/// funneled onto one single-threaded [`ExecutionContext`] so the
/// transport is never blocked by a slow application callback. Multiple
/// stubs may share one dispatcher.
pub struct CallDispatcher<Q: CompletionQueue> {
	queues: Vec<Arc<Q>>,
	registries: Vec<Arc<CallRegistry>>,
	workers: Vec<PollingWorker>,
	context: Arc<dyn ExecutionContext>,
	stats: Arc<dyn StatsRecorder>,
	cluster_id: ClusterIdCell,
	/// Round-robin cursor. Increments race freely across callers;
	/// only the long-run distribution over queues is even.
	cursor: AtomicUsize,
	next_token: AtomicU64,
	shutdown: Arc<AtomicBool>,
	default_timeout: Option<Duration>,
}

impl<Q: CompletionQueue> CallDispatcher<Q> {
	/// Starts the dispatcher: opens one completion queue per polling
	/// thread via `open_queue` and spawns the polling pool.
	pub fn new(
		options: DispatcherOptions,
		context: Arc<dyn ExecutionContext>,
		stats: Arc<dyn StatsRecorder>,
		mut open_queue: impl FnMut(usize) -> Arc<Q>,
	) -> std::io::Result<Self> {
		let threads = options.polling_threads.max(1);
		let shutdown = Arc::new(AtomicBool::new(false));

		let mut queues = Vec::with_capacity(threads);
		let mut registries = Vec::with_capacity(threads);
		for index in 0..threads {
			queues.push(open_queue(index));
			registries.push(Arc::new(CallRegistry::default()));
		}

		let mut workers = Vec::with_capacity(threads);
		for index in 0..threads {
			let spawned = PollingWorker::spawn(
				index,
				Arc::clone(&queues[index]),
				Arc::clone(&registries[index]),
				Arc::clone(&context),
				Arc::clone(&shutdown),
			);
			match spawned {
				Ok(worker) => workers.push(worker),
				Err(error) => {
					shutdown.store(true, Ordering::Release);
					for queue in &queues {
						queue.close();
					}
					for worker in workers {
						worker.join();
					}
					return Err(error);
				}
			}
		}

		// Start at a time-derived slot so dispatchers constructed
		// simultaneously do not all begin on queue 0. Load spreading
		// only; any offset is correct.
		let offset = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |now| now.subsec_nanos() as usize)
			% threads;

		debug!(polling_threads = threads, "rpc.dispatcher.start");
		Ok(Self {
			queues,
			registries,
			workers,
			context,
			stats,
			cluster_id: ClusterIdCell::new(options.cluster_id),
			cursor: AtomicUsize::new(offset),
			next_token: AtomicU64::new(0),
			shutdown,
			default_timeout: options.default_timeout,
		})
	}

	/// Creates one outstanding call and submits it through `stub`.
	///
	/// An explicit `timeout` takes precedence over the dispatcher
	/// default. There is no return value: transport failures,
	/// including a missed deadline, surface solely through the
	/// eventual callback status. Never blocks.
	pub fn create_call<S, Req, Reply>(
		&self,
		stub: &S,
		method: MethodDescriptor,
		request: Req,
		callback: CallCallback<Reply>,
		call_name: &str,
		timeout: Option<Duration>,
	) where
		S: Stub<Queue = Q>,
		Req: Send + 'static,
		Reply: Default + Send + 'static,
	{
		let stats = self.stats.record_start(call_name);
		let timeout = timeout.or(self.default_timeout);

		let mut context = CallContext::new(timeout);
		if let Some(id) = self.cluster_id.get() {
			context.add_metadata(CLUSTER_ID_KEY, id.hex());
		}

		let token = CallToken(self.next_token.fetch_add(1, Ordering::Relaxed));
		let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.queues.len();

		let call = TypedCall::new(callback, stats);
		// Registered before submission so the completion can never
		// observe a missing entry.
		self.registries[slot].register(token, Box::new(call));
		trace!(call_name, token = token.0, slot, "rpc.call.submit");
		stub.submit(&method, Box::new(request), context, &self.queues[slot], token);
	}

	/// Records the process cluster identity so calls created
	/// afterwards attach it as outgoing metadata.
	///
	/// Set-once: repeating the same identity is a no-op, a conflicting
	/// one is fatal.
	pub fn set_cluster_id(&self, id: ClusterId) {
		self.cluster_id.set(id);
	}

	/// The execution context completions are delivered on.
	#[must_use]
	pub fn context(&self) -> &Arc<dyn ExecutionContext> {
		&self.context
	}

	/// Number of calls currently awaiting completion.
	#[must_use]
	pub fn outstanding(&self) -> usize {
		self.registries.iter().map(|registry| registry.len()).sum()
	}

	/// Two-phase shutdown: raise the flag and close every queue, then
	/// block the caller (never the polling threads) until the pool has
	/// exited. Calls still in flight are dropped without delivery.
	fn shutdown(&mut self) {
		if self.workers.is_empty() {
			return;
		}
		self.shutdown.store(true, Ordering::Release);
		for queue in &self.queues {
			queue.close();
		}
		for worker in std::mem::take(&mut self.workers) {
			worker.join();
		}
		debug!("rpc.dispatcher.stop");
	}
}

impl<Q: CompletionQueue> Drop for CallDispatcher<Q> {
	fn drop(&mut self) {
		self.shutdown();
	}
}
