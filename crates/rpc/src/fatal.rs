//! Fatal-abort facility for invariant violations.

/// Logs an invariant violation and terminates.
///
/// Conditions guarded by this macro are programming defects in the
/// surrounding system, not runtime conditions a caller can act on.
/// Under `panic = "abort"` this takes the process down; tests observe
/// it with `#[should_panic]`.
#[macro_export]
macro_rules! fatal {
	($($arg:tt)*) => {{
		tracing::error!($($arg)*);
		panic!($($arg)*);
	}};
}
