//! Per-call accounting hooks.

use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

/// Opaque per-call accounting token.
///
/// Obtained from a [`StatsRecorder`] at call creation and released by
/// the delivery task (or the teardown drop path) at completion. The
/// recorder guarantees the token stays valid for the call's lifetime.
pub trait StatsHandle: Send + Sync {}

/// Collaborator notified when calls start.
pub trait StatsRecorder: Send + Sync {
	/// Records the start of one call under `call_name` and returns its
	/// accounting token.
	fn record_start(&self, call_name: &str) -> Arc<dyn StatsHandle>;
}

/// Default recorder: logs per-call timing through `tracing` when a
/// handle is released at completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStats;

struct TracingHandle {
	call_name: String,
	started: Instant,
}

impl StatsHandle for TracingHandle {}

impl Drop for TracingHandle {
	fn drop(&mut self) {
		let elapsed_us = self.started.elapsed().as_micros() as u64;
		trace!(call_name = %self.call_name, elapsed_us, "rpc.call.end");
	}
}

impl StatsRecorder for TracingStats {
	fn record_start(&self, call_name: &str) -> Arc<dyn StatsHandle> {
		trace!(call_name, "rpc.call.start");
		Arc::new(TracingHandle {
			call_name: call_name.to_owned(),
			started: Instant::now(),
		})
	}
}
