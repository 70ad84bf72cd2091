//! Cross-provider group membership synchronization engine.
//!
//! Synchronizes group membership across independent identity providers
//! despite unreliable, rate-limited backends: every provider call is
//! circuit-breaker wrapped and error-classified, mutations are idempotent
//! and audited, and transient failures are delivered eventually through a
//! durable retry ledger.
//!
//! # Core Components
//!
//! - [`ReconciliationOrchestrator`] - Entry point for member mutations
//! - [`GroupProvider`] - Trait implemented once per identity backend
//! - [`ProviderRegistry`] - Activation, primary election, prefix uniqueness
//! - [`mapper`] - Canonical ↔ provider-qualified group name translation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use group_sync::{GroupSyncConfig, ProviderCatalog, ProviderRegistry};
//! use std::sync::Arc;
//!
//! # use group_sync::{OperationResult, ProviderCapabilities, ProviderError};
//! # struct MyProvider;
//! # impl group_sync::GroupProvider for MyProvider {
//! #     fn name(&self) -> &str { "google" }
//! #     fn capabilities(&self) -> ProviderCapabilities { ProviderCapabilities::default() }
//! #     async fn add_member(&self, _: &str, _: &str) -> Result<OperationResult, ProviderError> { unimplemented!() }
//! #     async fn remove_member(&self, _: &str, _: &str) -> Result<OperationResult, ProviderError> { unimplemented!() }
//! #     async fn list_members(&self, _: &str) -> Result<OperationResult, ProviderError> { unimplemented!() }
//! #     async fn list_groups(&self) -> Result<OperationResult, ProviderError> { unimplemented!() }
//! #     async fn health_check(&self) -> Result<OperationResult, ProviderError> { unimplemented!() }
//! # }
//! # fn build_my_provider() -> impl group_sync::GroupProvider { MyProvider }
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = ProviderCatalog::new();
//! catalog.register("google", |_settings| Ok(build_my_provider()));
//!
//! let config: GroupSyncConfig = serde_json::from_str(
//!     r#"{"providers": {"google": {"is_primary": true}}}"#,
//! )?;
//! let registry = Arc::new(ProviderRegistry::activate(&catalog, &config)?);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod mapper;
pub mod operation;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod types;

// Re-export commonly used types for convenience
pub use audit::{AuditEntry, AuditTrail, InMemoryAuditTrail};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{
    CapabilityOverrides, CircuitBreakerSettings, GroupSyncConfig, IdempotencySettings,
    ProviderSettings, RetrySettings,
};
pub use error::{ActivationError, ActivationResult, GroupSyncError, GroupSyncResult};
pub use idempotency::{IdempotencyStore, InMemoryIdempotencyStore, derive_idempotency_key};
pub use mapper::{
    ParsedGroupName, canonical_to_primary_group, map_provider_group_id, parse_primary_group_name,
    primary_group_to_canonical,
};
pub use operation::{OperationResult, OperationStatus};
pub use orchestrator::ReconciliationOrchestrator;
pub use provider::{
    GroupProvider, ProviderCapabilities, ProviderError, ProviderHandle, ResilientProvider,
};
pub use registry::{ActiveProvider, ProviderCatalog, ProviderRegistry};
pub use retry::{
    InMemoryRetryLedger, MutationKind, OperationIntent, RetryLedger, RetryRecord, RetryStatus,
    RetrySweeper,
};
pub use types::{MemberRole, NormalizedGroup, NormalizedMember, normalize_email};
