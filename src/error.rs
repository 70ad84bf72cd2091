//! Error types for group synchronization operations.
//!
//! Two layers of errors exist: [`GroupSyncError`] for faults during normal
//! operation and [`ActivationError`] for startup/configuration faults.
//! Raw backend errors never cross the provider boundary; they are classified
//! into `OperationResult`s there (see the `provider` module), so the
//! variants here cover only this crate's own failure modes.

/// Main error type for runtime group-sync operations.
#[derive(Debug, thiserror::Error)]
pub enum GroupSyncError {
    /// An email address failed validation before reaching any backend.
    #[error("Invalid email address: {value}")]
    InvalidEmail { value: String },

    /// A provider name was not found in the active registry.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The source provider of an identifier mapping is not registered.
    #[error("Unknown source provider: {0}")]
    UnknownSourceProvider(String),

    /// The target provider of an identifier mapping is not registered.
    #[error("Unknown target provider: {0}")]
    UnknownTargetProvider(String),

    /// Direct mapping between two non-primary providers is not supported;
    /// callers must round-trip through the canonical form.
    #[error("Cannot map directly from '{from}' to '{to}': round-trip through canonical form")]
    UnsupportedMapping { from: String, to: String },

    /// A durable store (idempotency cache, retry ledger, audit trail) failed.
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal invariant violation.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while activating the provider registry.
///
/// These are configuration problems and always fail fast at startup;
/// none of them are recoverable at runtime.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// Configuration enabled a provider that was never registered in the catalog.
    #[error("Provider '{name}' is enabled but not registered in the catalog")]
    UnknownProvider { name: String },

    /// A provider factory failed to construct its provider.
    #[error("Failed to initialize provider '{name}': {message}")]
    Initialization { name: String, message: String },

    /// More than one active provider declared itself primary.
    #[error("Ambiguous primary provider, candidates: {candidates:?}")]
    AmbiguousPrimary { candidates: Vec<String> },

    /// No provider could be elected primary.
    #[error("No primary provider: none declared and {active} providers are active")]
    NoPrimary { active: usize },

    /// Two active providers resolved to the same effective prefix.
    #[error("Prefix '{prefix}' is claimed by both '{first}' and '{second}'")]
    PrefixCollision {
        prefix: String,
        first: String,
        second: String,
    },
}

impl GroupSyncError {
    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a store error, preserving its display form.
    pub fn store<E: std::fmt::Display>(error: E) -> Self {
        Self::Store(error.to_string())
    }
}

// Result type aliases for convenience
pub type GroupSyncResult<T> = Result<T, GroupSyncError>;
pub type ActivationResult<T> = Result<T, ActivationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_messages() {
        let e = GroupSyncError::UnknownSourceProvider("okta".to_string());
        assert_eq!(e.to_string(), "Unknown source provider: okta");
        let e = GroupSyncError::UnknownTargetProvider("okta".to_string());
        assert_eq!(e.to_string(), "Unknown target provider: okta");
    }

    #[test]
    fn test_activation_error_display() {
        let e = ActivationError::PrefixCollision {
            prefix: "aws".to_string(),
            first: "aws".to_string(),
            second: "aws-gov".to_string(),
        };
        assert!(e.to_string().contains("aws"));
    }
}
