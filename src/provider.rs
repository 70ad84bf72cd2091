//! Group provider contract and the resilience wrapper around it.
//!
//! A [`GroupProvider`] is implemented once per identity backend (Google
//! Workspace, AWS Identity Center, ...). Implementations speak their
//! backend's SDK internally and surface either an [`OperationResult`]
//! directly (passed through untouched, never double-wrapped) or a raw
//! [`ProviderError`] which is classified at this boundary. Nothing above
//! this module ever sees a raw backend error.
//!
//! [`ResilientProvider`] is the wrapper every registered provider runs
//! behind: it validates and normalizes email input on write operations,
//! consults the provider's [`CircuitBreaker`] before each call, classifies
//! raw errors, and feeds outcomes back into the breaker.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::operation::{OperationResult, OperationStatus};
use crate::types::normalize_email;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Default backoff in seconds for transient errors without an advertised cooldown.
pub const DEFAULT_BACKOFF_SECONDS: u64 = 30;

/// Raw error surfaced by a provider implementation's backend calls.
///
/// Variants mirror the failure shapes of HTTP-based identity APIs; the
/// classification into an [`OperationResult`] happens once, at the
/// provider boundary, via [`ProviderError::classify`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP 429 or equivalent throttling signal.
    #[error("Rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// HTTP 401: credentials rejected.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// HTTP 403: authenticated but not permitted.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// HTTP 404: the group or member does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// HTTP 5xx from the backend.
    #[error("Backend error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The backend call timed out.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// The connection was reset mid-call.
    #[error("Connection reset: {message}")]
    ConnectionReset { message: String },

    /// Malformed input detected by the backend or SDK.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Anything the implementation could not classify.
    #[error("Provider error: {message}")]
    Other { message: String },
}

impl ProviderError {
    /// Default classification of a raw backend error into an operation result.
    ///
    /// Unclassified errors fail toward retry (transient), not toward silent
    /// loss. 401 maps to the UNAUTHORIZED status so credential rot is
    /// visible at elevated severity; 403 and 404 are terminal caller-side
    /// problems and never tripped back to the retry ledger.
    pub fn classify(&self, provider: &str) -> OperationResult {
        match self {
            Self::RateLimited { retry_after } => OperationResult::transient_with_retry_after(
                format!("Provider '{provider}' rate limited the request"),
                OperationResult::RATE_LIMITED,
                retry_after.unwrap_or(DEFAULT_BACKOFF_SECONDS),
            ),
            Self::Unauthorized { message } => {
                OperationResult::unauthorized(format!("Provider '{provider}': {message}"))
            }
            Self::Forbidden { message } => OperationResult::permanent(
                format!("Provider '{provider}' denied access: {message}"),
                "FORBIDDEN",
            ),
            Self::NotFound { message } => {
                OperationResult::not_found(format!("Provider '{provider}': {message}"))
            }
            Self::ServerError { status, message } => OperationResult::transient_with_retry_after(
                format!("Provider '{provider}' backend error {status}: {message}"),
                "BACKEND_ERROR",
                DEFAULT_BACKOFF_SECONDS,
            ),
            Self::Timeout { message } => OperationResult::transient_with_retry_after(
                format!("Provider '{provider}' timed out: {message}"),
                "TIMEOUT",
                DEFAULT_BACKOFF_SECONDS,
            ),
            Self::ConnectionReset { message } => OperationResult::transient_with_retry_after(
                format!("Provider '{provider}' connection reset: {message}"),
                "CONNECTION_RESET",
                DEFAULT_BACKOFF_SECONDS,
            ),
            Self::InvalidInput { message } => OperationResult::permanent(
                format!("Invalid input for provider '{provider}': {message}"),
                OperationResult::INVALID_INPUT,
            ),
            Self::Other { message } => OperationResult::transient_with_retry_after(
                format!("Provider '{provider}' unclassified error: {message}"),
                "UNCLASSIFIED",
                DEFAULT_BACKOFF_SECONDS,
            ),
        }
    }
}

/// Static capability descriptor for one provider instance.
///
/// Exactly one active provider may set `is_primary`; the registry enforces
/// this at activation, not at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Whether this provider is the source of truth for canonical names.
    pub is_primary: bool,
    /// Whether add/remove member operations are supported.
    pub supports_member_management: bool,
    /// Whether member listings carry meaningful role information.
    pub provides_role_info: bool,
    /// Whether the provider can enumerate its groups.
    pub supports_group_listing: bool,
    /// Whether the provider exposes a health probe.
    pub supports_health_check: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            is_primary: false,
            supports_member_management: true,
            provides_role_info: false,
            supports_group_listing: true,
            supports_health_check: true,
        }
    }
}

/// Contract implemented once per identity backend.
///
/// Operations return `Ok(OperationResult)` for any outcome the
/// implementation already classified (including failures), or
/// `Err(ProviderError)` for a raw backend fault to be classified by the
/// wrapper. Returning an already-built `OperationResult` is a pass-through:
/// the wrapper never re-wraps it.
pub trait GroupProvider: Send + Sync + 'static {
    /// Stable provider name used for registry keys and prefixes.
    fn name(&self) -> &str;

    /// Static capabilities of this instance.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Add a member to a group. `email` arrives already normalized.
    fn add_member(
        &self,
        group_key: &str,
        email: &str,
    ) -> impl Future<Output = Result<OperationResult, ProviderError>> + Send;

    /// Remove a member from a group. `email` arrives already normalized.
    fn remove_member(
        &self,
        group_key: &str,
        email: &str,
    ) -> impl Future<Output = Result<OperationResult, ProviderError>> + Send;

    /// List members of a group; payload is a JSON array of normalized members.
    fn list_members(
        &self,
        group_key: &str,
    ) -> impl Future<Output = Result<OperationResult, ProviderError>> + Send;

    /// List all groups; payload is a JSON array of normalized groups.
    fn list_groups(&self) -> impl Future<Output = Result<OperationResult, ProviderError>> + Send;

    /// Probe backend health.
    fn health_check(&self) -> impl Future<Output = Result<OperationResult, ProviderError>> + Send;

    /// Classify a raw backend error into an operation result.
    ///
    /// The default applies the standard HTTP-shaped mapping; providers with
    /// richer error envelopes override this.
    fn classify_error(&self, error: &ProviderError) -> OperationResult {
        error.classify(self.name())
    }
}

/// Boxed operation future used by the object-safe provider facade.
pub type BoxedOperation<'a> = Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>>;

/// Object-safe, result-only facade over a wrapped provider.
///
/// The registry stores heterogeneous providers behind this trait; every
/// method resolves to an [`OperationResult`], never an error, because all
/// classification happened inside the wrapper.
pub trait ProviderHandle: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> ProviderCapabilities;
    fn add_member<'a>(&'a self, group_key: &'a str, email: &'a str) -> BoxedOperation<'a>;
    fn remove_member<'a>(&'a self, group_key: &'a str, email: &'a str) -> BoxedOperation<'a>;
    fn list_members<'a>(&'a self, group_key: &'a str) -> BoxedOperation<'a>;
    fn list_groups(&self) -> BoxedOperation<'_>;
    fn health_check(&self) -> BoxedOperation<'_>;
}

/// Circuit-breaker-wrapped provider.
///
/// Owns the breaker for exactly one backend; breaker state is never shared
/// between providers.
pub struct ResilientProvider<P> {
    inner: P,
    breaker: CircuitBreaker,
}

impl<P: GroupProvider> ResilientProvider<P> {
    /// Wrap a provider with a breaker built from the given configuration.
    pub fn new(inner: P, breaker_config: CircuitBreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(inner.name(), breaker_config);
        Self { inner, breaker }
    }

    /// Provider name, forwarded from the wrapped implementation.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Capabilities, forwarded from the wrapped implementation.
    pub fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    /// Current breaker state, for health reporting.
    pub async fn breaker_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    /// Add a member, validating the email before any backend work.
    pub async fn add_member(&self, group_key: &str, email: &str) -> OperationResult {
        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(e) => return invalid_input(e),
        };
        self.guarded(self.inner.add_member(group_key, &email)).await
    }

    /// Remove a member, validating the email before any backend work.
    pub async fn remove_member(&self, group_key: &str, email: &str) -> OperationResult {
        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(e) => return invalid_input(e),
        };
        self.guarded(self.inner.remove_member(group_key, &email))
            .await
    }

    /// List members of a group.
    pub async fn list_members(&self, group_key: &str) -> OperationResult {
        self.guarded(self.inner.list_members(group_key)).await
    }

    /// List all groups.
    pub async fn list_groups(&self) -> OperationResult {
        self.guarded(self.inner.list_groups()).await
    }

    /// Probe backend health.
    pub async fn health_check(&self) -> OperationResult {
        self.guarded(self.inner.health_check()).await
    }

    /// Run one call through the breaker and classify its outcome.
    ///
    /// The implementation future is constructed lazily by the caller and
    /// only polled after the breaker admits the call, so a rejection means
    /// no backend work happened.
    async fn guarded<F>(&self, call: F) -> OperationResult
    where
        F: Future<Output = Result<OperationResult, ProviderError>>,
    {
        if let Err(rejection) = self.breaker.preflight().await {
            log::debug!(
                "call to provider '{}' rejected by open circuit breaker",
                self.name()
            );
            return rejection;
        }

        let result = match call.await {
            Ok(result) => result,
            Err(raw) => {
                log::debug!("classifying raw error from provider '{}': {raw}", self.name());
                self.inner.classify_error(&raw)
            }
        };

        if result.is_transient() {
            self.breaker.record_failure().await;
        } else {
            self.breaker.record_success().await;
        }

        if result.status == OperationStatus::Unauthorized {
            // Elevated severity: may indicate credential rot.
            log::error!(
                "provider '{}' returned UNAUTHORIZED: {}",
                self.name(),
                result.message
            );
        }

        result
    }
}

fn invalid_input(error: crate::error::GroupSyncError) -> OperationResult {
    OperationResult::permanent(error.to_string(), OperationResult::INVALID_INPUT)
}

impl<P: GroupProvider> ProviderHandle for ResilientProvider<P> {
    fn name(&self) -> &str {
        ResilientProvider::name(self)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ResilientProvider::capabilities(self)
    }

    fn add_member<'a>(&'a self, group_key: &'a str, email: &'a str) -> BoxedOperation<'a> {
        Box::pin(ResilientProvider::add_member(self, group_key, email))
    }

    fn remove_member<'a>(&'a self, group_key: &'a str, email: &'a str) -> BoxedOperation<'a> {
        Box::pin(ResilientProvider::remove_member(self, group_key, email))
    }

    fn list_members<'a>(&'a self, group_key: &'a str) -> BoxedOperation<'a> {
        Box::pin(ResilientProvider::list_members(self, group_key))
    }

    fn list_groups(&self) -> BoxedOperation<'_> {
        Box::pin(ResilientProvider::list_groups(self))
    }

    fn health_check(&self) -> BoxedOperation<'_> {
        Box::pin(ResilientProvider::health_check(self))
    }
}
