//! Execution context that runs user-visible callback code.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::stats::StatsHandle;

/// A scheduled delivery closure.
pub type DeliveryTask = Box<dyn FnOnce() + Send>;

/// Single-threaded cooperative scheduler for user-visible callbacks.
///
/// Delivery tasks run serially and to completion; a slow callback
/// stalls later deliveries but never the polling threads.
pub trait ExecutionContext: Send + Sync {
	/// Schedules `task` together with its per-task accounting token.
	///
	/// A stopped context discards the task; the caller must check
	/// [`ExecutionContext::is_stopped`] first when it needs to know.
	fn post(&self, task: DeliveryTask, stats: Arc<dyn StatsHandle>);

	/// True once the context no longer runs scheduled tasks.
	fn is_stopped(&self) -> bool;
}

/// Owned [`ExecutionContext`] draining tasks on one named thread.
///
/// Provided so the dispatcher is usable out of the box; callers with
/// their own event loop implement [`ExecutionContext`] instead.
pub struct SerialContext {
	tx: Option<mpsc::UnboundedSender<(DeliveryTask, Arc<dyn StatsHandle>)>>,
	stop: CancellationToken,
	thread: Option<JoinHandle<()>>,
}

impl SerialContext {
	/// Spawns the delivery thread.
	pub fn new() -> std::io::Result<Self> {
		let (tx, mut rx) = mpsc::unbounded_channel::<(DeliveryTask, Arc<dyn StatsHandle>)>();
		let stop = CancellationToken::new();
		let drain_stop = stop.clone();
		let thread = std::thread::Builder::new()
			.name("rpc-deliver".into())
			.spawn(move || {
				while let Some((task, stats)) = rx.blocking_recv() {
					if drain_stop.is_cancelled() {
						break;
					}
					task();
					// Releasing the token marks the call as consumed.
					drop(stats);
				}
				trace!("rpc.deliver.stop");
			})?;
		Ok(Self {
			tx: Some(tx),
			stop,
			thread: Some(thread),
		})
	}

	/// Stops the context. Tasks posted afterwards are discarded;
	/// already queued tasks are dropped as the drain thread observes
	/// the stop.
	pub fn stop(&self) {
		self.stop.cancel();
	}
}

impl ExecutionContext for SerialContext {
	fn post(&self, task: DeliveryTask, stats: Arc<dyn StatsHandle>) {
		if self.stop.is_cancelled() {
			trace!("rpc.deliver.discard");
			return;
		}
		if let Some(tx) = &self.tx {
			let _ = tx.send((task, stats));
		}
	}

	fn is_stopped(&self) -> bool {
		self.stop.is_cancelled()
	}
}

impl Drop for SerialContext {
	fn drop(&mut self) {
		self.stop.cancel();
		// Closing the channel wakes a drain thread blocked in recv.
		self.tx.take();
		if let Some(thread) = self.thread.take() {
			let _ = thread.join();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;

	struct NoopHandle;
	impl StatsHandle for NoopHandle {}

	fn handle() -> Arc<dyn StatsHandle> {
		Arc::new(NoopHandle)
	}

	#[test]
	fn tasks_run_in_post_order() {
		let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
		let context = SerialContext::new().unwrap();
		let (done_tx, done_rx) = std::sync::mpsc::channel();
		for index in 0..8 {
			let order = Arc::clone(&order);
			let done_tx = done_tx.clone();
			context.post(
				Box::new(move || {
					order.lock().push(index);
					let _ = done_tx.send(());
				}),
				handle(),
			);
		}
		for _ in 0..8 {
			done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
		}
		assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
	}

	#[test]
	fn post_after_stop_is_discarded() {
		let ran = Arc::new(AtomicUsize::new(0));
		let context = SerialContext::new().unwrap();
		context.stop();
		assert!(context.is_stopped());
		let counter = Arc::clone(&ran);
		context.post(
			Box::new(move || {
				counter.fetch_add(1, Ordering::SeqCst);
			}),
			handle(),
		);
		drop(context);
		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn drop_joins_the_drain_thread() {
		let context = SerialContext::new().unwrap();
		let (done_tx, done_rx) = std::sync::mpsc::channel();
		context.post(
			Box::new(move || {
				let _ = done_tx.send(());
			}),
			handle(),
		);
		done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
		drop(context);
	}
}
