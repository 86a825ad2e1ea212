//! Cluster identity attached to outgoing calls.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use uuid::Uuid;

/// System-wide identifier optionally attached to outgoing calls as
/// metadata, expected to be stable for the lifetime of the process
/// once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(Uuid);

impl ClusterId {
	/// Creates a random identity.
	#[must_use]
	pub fn random() -> Self {
		Self(Uuid::new_v4())
	}

	/// Hex rendering used as outgoing metadata.
	#[must_use]
	pub fn hex(&self) -> String {
		self.0.simple().to_string()
	}
}

impl From<Uuid> for ClusterId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl fmt::Display for ClusterId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

/// Lock-free cell holding the process cluster identity, nil until set.
///
/// The set-once discipline is enforced with a fatal check layered on
/// an atomic exchange rather than a lock: a process must never observe
/// two different cluster identities.
#[derive(Debug, Default)]
pub(crate) struct ClusterIdCell {
	inner: ArcSwapOption<ClusterId>,
}

impl ClusterIdCell {
	/// Creates the cell, pre-populated when the identity is already
	/// known at construction.
	pub fn new(id: Option<ClusterId>) -> Self {
		Self {
			inner: ArcSwapOption::from(id.map(Arc::new)),
		}
	}

	/// Current identity, `None` while unset.
	pub fn get(&self) -> Option<ClusterId> {
		self.inner.load_full().map(|id| *id)
	}

	/// Stores `id` durably so calls created afterwards attach it.
	///
	/// Setting the same identity again is a no-op; a different
	/// previous identity is fatal.
	pub fn set(&self, id: ClusterId) {
		let previous = self.inner.swap(Some(Arc::new(id)));
		if let Some(previous) = previous
			&& *previous != id
		{
			crate::fatal!("conflicting cluster identity: expected nil or {id}, got {previous}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_is_32_lowercase_chars() {
		let hex = ClusterId::random().hex();
		assert_eq!(hex.len(), 32);
		assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}

	#[test]
	fn set_is_durable() {
		let cell = ClusterIdCell::default();
		assert!(cell.get().is_none());
		let id = ClusterId::random();
		cell.set(id);
		assert_eq!(cell.get(), Some(id));
	}

	#[test]
	fn repeated_set_of_same_identity_is_allowed() {
		let cell = ClusterIdCell::default();
		let id = ClusterId::random();
		cell.set(id);
		cell.set(id);
		assert_eq!(cell.get(), Some(id));
	}

	#[test]
	#[should_panic(expected = "conflicting cluster identity")]
	fn conflicting_set_is_fatal() {
		let cell = ClusterIdCell::default();
		cell.set(ClusterId::random());
		cell.set(ClusterId::random());
	}

	#[test]
	fn construction_identity_is_visible() {
		let id = ClusterId::random();
		let cell = ClusterIdCell::new(Some(id));
		assert_eq!(cell.get(), Some(id));
	}
}
