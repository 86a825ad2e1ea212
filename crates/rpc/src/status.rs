//! Raw transport status and the domain status delivered to callbacks.

use thiserror::Error;

/// Coarse status code reported by the transport for a completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
	/// The call completed successfully.
	Ok,
	/// The per-call deadline elapsed before a reply arrived.
	DeadlineExceeded,
	/// The remote endpoint could not be reached.
	Unavailable,
	/// The call was cancelled by the transport.
	Cancelled,
	/// The remote endpoint refused the call for lack of resources.
	ResourceExhausted,
	/// Any other transport-level failure.
	Internal,
}

/// Raw per-call status as written by the transport at completion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStatus {
	/// Status code.
	pub code: TransportCode,
	/// Human-readable detail, empty on success.
	pub message: String,
}

impl TransportStatus {
	/// Successful completion.
	#[must_use]
	pub fn ok() -> Self {
		Self {
			code: TransportCode::Ok,
			message: String::new(),
		}
	}

	/// Failed completion with a detail message.
	#[must_use]
	pub fn error(code: TransportCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}

	/// Converts this transport-native status into the domain status
	/// seen by callbacks.
	#[must_use]
	pub fn to_call_status(&self) -> CallStatus {
		match self.code {
			TransportCode::Ok => Ok(()),
			TransportCode::DeadlineExceeded => Err(CallError::DeadlineExceeded(self.message.clone())),
			TransportCode::Unavailable => Err(CallError::Unavailable(self.message.clone())),
			TransportCode::Cancelled => Err(CallError::Cancelled(self.message.clone())),
			TransportCode::ResourceExhausted => Err(CallError::ResourceExhausted(self.message.clone())),
			TransportCode::Internal => Err(CallError::Transport(self.message.clone())),
		}
	}
}

/// Failure delivered to a call's callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
	/// The per-call deadline elapsed before a reply arrived.
	#[error("deadline exceeded: {0}")]
	DeadlineExceeded(String),

	/// The remote endpoint could not be reached.
	#[error("endpoint unavailable: {0}")]
	Unavailable(String),

	/// The call was cancelled by the transport.
	#[error("call cancelled: {0}")]
	Cancelled(String),

	/// The remote endpoint refused the call for lack of resources.
	#[error("resource exhausted: {0}")]
	ResourceExhausted(String),

	/// Any other transport-level failure.
	#[error("transport error: {0}")]
	Transport(String),
}

impl CallError {
	/// True when the failure was the call's own deadline elapsing.
	#[must_use]
	pub fn is_deadline_exceeded(&self) -> bool {
		matches!(self, Self::DeadlineExceeded(_))
	}
}

/// Terminal status of a completed call, as seen by its callback.
///
/// Recoverable outcomes travel only through this channel; the manager
/// never escalates a transport-reported failure.
pub type CallStatus = Result<(), CallError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ok_status_converts_to_success() {
		assert_eq!(TransportStatus::ok().to_call_status(), Ok(()));
	}

	#[test]
	fn deadline_code_converts_to_deadline_error() {
		let status = TransportStatus::error(TransportCode::DeadlineExceeded, "50ms elapsed");
		let err = status.to_call_status().unwrap_err();
		assert!(err.is_deadline_exceeded());
		assert_eq!(err.to_string(), "deadline exceeded: 50ms elapsed");
	}

	#[test]
	fn each_failure_code_maps_to_a_distinct_error() {
		let cases = [
			(TransportCode::Unavailable, "endpoint unavailable: x"),
			(TransportCode::Cancelled, "call cancelled: x"),
			(TransportCode::ResourceExhausted, "resource exhausted: x"),
			(TransportCode::Internal, "transport error: x"),
		];
		for (code, rendered) in cases {
			let err = TransportStatus::error(code, "x").to_call_status().unwrap_err();
			assert_eq!(err.to_string(), rendered);
		}
	}
}
