//! Per-call state and the completion contract between the dispatcher,
//! the polling workers, and the execution context.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::stats::StatsHandle;
use crate::status::{CallStatus, TransportStatus};
use crate::transport::CompletionEvent;

/// Callback invoked with a call's terminal status and reply.
pub type CallCallback<Reply> = Box<dyn FnOnce(CallStatus, Reply) + Send>;

/// One outstanding call, type-erased over its reply payload.
///
/// Exactly one owner at a time: the dispatcher registers the call, the
/// owning polling worker reclaims it when its tag reappears, and the
/// delivery task owns it until the callback has run. The handoffs
/// enforce finalize → deliver → drop as a strict order per call.
pub trait Call: Send {
	/// Converts the event's transport status into the domain status
	/// and stores it, together with the reply payload. Called exactly
	/// once by the owning worker.
	fn finalize(&mut self, event: CompletionEvent);

	/// Stored terminal status. Safe to call concurrently with
	/// [`Call::finalize`], but meaningful only afterwards; defaults to
	/// success while unset.
	fn status(&self) -> CallStatus;

	/// Accounting handle attached at creation. `None` at completion
	/// time is an invariant violation the worker treats as fatal.
	fn stats_handle(&self) -> Option<Arc<dyn StatsHandle>>;

	/// Invokes the callback with the stored status and reply,
	/// consuming the call. At most once per call; enforced by the
	/// consuming receiver.
	fn deliver(self: Box<Self>);
}

/// [`Call`] implementation for one reply payload type.
///
/// `Reply: Default` so failed calls still hand the callback a reply
/// value beside the failure status.
pub struct TypedCall<Reply> {
	/// Callback, taken exactly once at delivery.
	callback: Option<CallCallback<Reply>>,
	/// Reply payload, written once at finalize.
	reply: Option<Reply>,
	/// Raw transport status, written once at finalize.
	raw_status: Option<TransportStatus>,
	/// Terminal status derived from the raw status. Written and read
	/// only under lock; copied out before the callback runs so user
	/// code never executes while holding it.
	status: Mutex<Option<CallStatus>>,
	/// Per-call accounting token, shared with the stats subsystem.
	stats: Option<Arc<dyn StatsHandle>>,
}

impl<Reply> TypedCall<Reply>
where
	Reply: Default + Send + 'static,
{
	/// Creates a call ready for registration and submission.
	#[must_use]
	pub fn new(callback: CallCallback<Reply>, stats: Arc<dyn StatsHandle>) -> Self {
		Self {
			callback: Some(callback),
			reply: None,
			raw_status: None,
			status: Mutex::new(None),
			stats: Some(stats),
		}
	}

	/// Raw transport status, once finalized.
	#[must_use]
	pub fn raw_status(&self) -> Option<&TransportStatus> {
		self.raw_status.as_ref()
	}
}

impl<Reply> Call for TypedCall<Reply>
where
	Reply: Default + Send + 'static,
{
	fn finalize(&mut self, event: CompletionEvent) {
		if let Some(payload) = event.payload {
			match payload.downcast::<Reply>() {
				Ok(reply) => self.reply = Some(*reply),
				Err(_) => crate::fatal!("reply payload type mismatch for call token {}", event.token.0),
			}
		}
		let status = event.status.to_call_status();
		self.raw_status = Some(event.status);
		let mut stored = self.status.lock();
		debug_assert!(stored.is_none(), "call finalized twice");
		*stored = Some(status);
	}

	fn status(&self) -> CallStatus {
		self.status.lock().clone().unwrap_or(Ok(()))
	}

	fn stats_handle(&self) -> Option<Arc<dyn StatsHandle>> {
		self.stats.clone()
	}

	fn deliver(mut self: Box<Self>) {
		let status = { self.status.lock().clone().unwrap_or(Ok(())) };
		// Lock released; the callback may re-enter the manager freely.
		if let Some(callback) = self.callback.take() {
			callback(status, self.reply.take().unwrap_or_default());
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::status::{CallError, TransportCode};
	use crate::transport::CallToken;

	struct NoopHandle;
	impl StatsHandle for NoopHandle {}

	fn event(status: TransportStatus, payload: Option<Box<dyn std::any::Any + Send>>) -> CompletionEvent {
		CompletionEvent {
			token: CallToken(7),
			serviced: true,
			status,
			payload,
		}
	}

	#[test]
	fn finalize_stores_status_and_reply() {
		let mut call = TypedCall::<String>::new(Box::new(|_, _| {}), Arc::new(NoopHandle));
		call.finalize(event(TransportStatus::ok(), Some(Box::new("pong".to_owned()))));
		assert_eq!(call.status(), Ok(()));
		assert_eq!(call.raw_status().unwrap().code, TransportCode::Ok);
	}

	#[test]
	fn status_defaults_to_success_before_finalize() {
		let call = TypedCall::<String>::new(Box::new(|_, _| {}), Arc::new(NoopHandle));
		assert_eq!(call.status(), Ok(()));
	}

	#[test]
	fn deliver_hands_the_finalized_status_to_the_callback() {
		let delivered = Arc::new(Mutex::new(None));
		let sink = Arc::clone(&delivered);
		let mut call = TypedCall::<String>::new(
			Box::new(move |status, reply| {
				*sink.lock() = Some((status, reply));
			}),
			Arc::new(NoopHandle),
		);
		call.finalize(event(
			TransportStatus::error(TransportCode::Unavailable, "refused"),
			None,
		));
		let expected = call.status();
		Box::new(call).deliver();

		let (status, reply) = delivered.lock().take().unwrap();
		assert_eq!(status, expected);
		assert_eq!(status, Err(CallError::Unavailable("refused".into())));
		// No payload on the failure path: the callback gets a default reply.
		assert_eq!(reply, String::new());
	}

	#[test]
	fn deliver_invokes_the_callback_once() {
		let invocations = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&invocations);
		let mut call = TypedCall::<u64>::new(
			Box::new(move |_, _| {
				counter.fetch_add(1, Ordering::SeqCst);
			}),
			Arc::new(NoopHandle),
		);
		call.finalize(event(TransportStatus::ok(), Some(Box::new(3u64))));
		Box::new(call).deliver();
		assert_eq!(invocations.load(Ordering::SeqCst), 1);
	}

	#[test]
	#[should_panic(expected = "reply payload type mismatch")]
	fn payload_type_confusion_is_fatal() {
		let mut call = TypedCall::<String>::new(Box::new(|_, _| {}), Arc::new(NoopHandle));
		call.finalize(event(TransportStatus::ok(), Some(Box::new(42u32))));
	}

	#[test]
	fn stats_handle_survives_until_delivery() {
		let call = TypedCall::<String>::new(Box::new(|_, _| {}), Arc::new(NoopHandle));
		assert!(call.stats_handle().is_some());
	}
}
