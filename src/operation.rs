//! Uniform operation result type for provider calls and retried operations.
//!
//! Every provider call, retry attempt, and orchestrator-level operation in
//! this crate settles into an [`OperationResult`]. The result is constructed
//! once per attempt and never mutated; it serializes byte-stably so the
//! idempotency cache can hand back an identical result on replay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status taxonomy for operation outcomes.
///
/// `TransientError` is the only non-terminal status: it signals that the
/// operation is eligible for system-initiated retry via the retry ledger.
/// All other statuses are terminal and surfaced to the caller as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// The operation completed successfully.
    Success,
    /// The operation failed in a way that may succeed on retry.
    TransientError,
    /// The operation failed permanently and must not be retried.
    PermanentError,
    /// The target resource does not exist (caller input problem).
    NotFound,
    /// The caller or service credentials were rejected.
    Unauthorized,
}

/// Immutable result of a single operation attempt.
///
/// Invariant: `retry_after` is only present when `status` is
/// [`OperationStatus::TransientError`]. The constructors enforce this;
/// there is no public mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Outcome classification for this attempt.
    pub status: OperationStatus,
    /// Human-readable description of the outcome.
    pub message: String,
    /// Optional payload (member lists, group lists, health details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Machine-readable error code for failure outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Suggested delay in seconds before retrying; transient errors only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl OperationResult {
    /// The circuit breaker rejected the call without contacting the backend.
    pub const CIRCUIT_BREAKER_OPEN: &'static str = "CIRCUIT_BREAKER_OPEN";
    /// Caller-supplied input (email, group key) failed validation.
    pub const INVALID_INPUT: &'static str = "INVALID_INPUT";
    /// The backend advertised a rate-limit cooldown.
    pub const RATE_LIMITED: &'static str = "RATE_LIMITED";
    /// A provider name was not found in the active registry.
    pub const UNKNOWN_PROVIDER: &'static str = "UNKNOWN_PROVIDER";

    /// Create a success result with a message and no payload.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Success,
            message: message.into(),
            data: None,
            error_code: None,
            retry_after: None,
        }
    }

    /// Create a success result carrying a data payload.
    pub fn success_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    /// Create a transient error with no advertised cooldown.
    pub fn transient(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::TransientError,
            message: message.into(),
            data: None,
            error_code: Some(error_code.into()),
            retry_after: None,
        }
    }

    /// Create a transient error with a provider-advertised cooldown in seconds.
    pub fn transient_with_retry_after(
        message: impl Into<String>,
        error_code: impl Into<String>,
        retry_after: u64,
    ) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::transient(message, error_code)
        }
    }

    /// Create a permanent error result.
    pub fn permanent(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::PermanentError,
            message: message.into(),
            data: None,
            error_code: Some(error_code.into()),
            retry_after: None,
        }
    }

    /// Create a not-found result.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::NotFound,
            message: message.into(),
            data: None,
            error_code: Some("NOT_FOUND".to_string()),
            retry_after: None,
        }
    }

    /// Create an unauthorized result.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Unauthorized,
            message: message.into(),
            data: None,
            error_code: Some("UNAUTHORIZED".to_string()),
            retry_after: None,
        }
    }

    /// Whether this result represents success.
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    /// Whether this result is eligible for system-initiated retry.
    pub fn is_transient(&self) -> bool {
        self.status == OperationStatus::TransientError
    }

    /// Whether this result is terminal (everything except transient).
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn retry_after_only_on_transient() {
        let r = OperationResult::transient_with_retry_after("throttled", "RATE_LIMITED", 30);
        assert_eq!(r.status, OperationStatus::TransientError);
        assert_eq!(r.retry_after, Some(30));

        for r in [
            OperationResult::success("ok"),
            OperationResult::permanent("bad", "INVALID_INPUT"),
            OperationResult::not_found("missing"),
            OperationResult::unauthorized("denied"),
        ] {
            assert!(r.retry_after.is_none());
        }
    }

    #[test]
    fn serde_round_trip_is_byte_identical() {
        let r = OperationResult::success_with_data("added", json!({"email": "a@b.com"}));
        let first = serde_json::to_string(&r).unwrap();
        let back: OperationResult = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&back).unwrap();
        assert_eq!(first, second);
        assert_eq!(r, back);
    }

    #[test]
    fn terminal_classification() {
        assert!(OperationResult::success("ok").is_terminal());
        assert!(OperationResult::permanent("no", "X").is_terminal());
        assert!(OperationResult::not_found("no").is_terminal());
        assert!(OperationResult::unauthorized("no").is_terminal());
        assert!(!OperationResult::transient("later", "X").is_terminal());
    }
}
