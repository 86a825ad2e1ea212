//! Outstanding-call table keyed by completion token.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::call::Call;
use crate::transport::CallToken;

/// Calls outstanding on one polling slot, keyed by their tag.
///
/// The dispatcher inserts before submission and the owning worker
/// removes at completion, so a tag reappearing from the queue always
/// finds its call. Entries left behind at shutdown drop without
/// delivery. The lock is held only for insert/remove, never across
/// user code.
#[derive(Default)]
pub(crate) struct CallRegistry {
	inner: Mutex<HashMap<CallToken, Box<dyn Call>>>,
}

impl CallRegistry {
	/// Registers one outstanding call under `token`.
	pub fn register(&self, token: CallToken, call: Box<dyn Call>) {
		self.inner.lock().insert(token, call);
	}

	/// Reclaims the call for `token`, transferring ownership to the
	/// caller.
	pub fn claim(&self, token: CallToken) -> Option<Box<dyn Call>> {
		self.inner.lock().remove(&token)
	}

	/// Number of outstanding calls on this slot.
	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::call::TypedCall;
	use crate::stats::StatsHandle;

	struct NoopHandle;
	impl StatsHandle for NoopHandle {}

	fn boxed_call() -> Box<dyn Call> {
		Box::new(TypedCall::<String>::new(Box::new(|_, _| {}), Arc::new(NoopHandle)))
	}

	#[test]
	fn claim_transfers_ownership_once() {
		let registry = CallRegistry::default();
		registry.register(CallToken(1), boxed_call());
		assert_eq!(registry.len(), 1);
		assert!(registry.claim(CallToken(1)).is_some());
		assert!(registry.claim(CallToken(1)).is_none());
		assert_eq!(registry.len(), 0);
	}

	#[test]
	fn unknown_token_yields_nothing() {
		let registry = CallRegistry::default();
		assert!(registry.claim(CallToken(9)).is_none());
	}
}
