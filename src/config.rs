//! Configuration surface for the synchronization engine.
//!
//! All settings deserialize from the host application's config file via
//! serde; every field has a sensible default so a minimal deployment can
//! configure nothing but its providers.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::provider::ProviderCapabilities;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSyncConfig {
    /// Per-provider settings, keyed by catalog name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    /// Circuit breaker tuning, shared by all providers.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Retry ledger tuning.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Idempotency cache tuning.
    #[serde(default)]
    pub idempotency: IdempotencySettings,
}

/// Settings for one provider entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Whether to activate this provider at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit group-name prefix; defaults to the provider name. An empty
    /// string opts the provider out of prefix-based name parsing.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Primary-provider override; when unset the provider's own
    /// capabilities decide.
    #[serde(default)]
    pub is_primary: Option<bool>,
    /// Capability overrides applied on top of the provider's declared set.
    #[serde(default)]
    pub capabilities: Option<CapabilityOverrides>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: None,
            is_primary: None,
            capabilities: None,
        }
    }
}

impl ProviderSettings {
    /// Apply this entry's overrides to a provider's declared capabilities.
    pub fn effective_capabilities(&self, declared: ProviderCapabilities) -> ProviderCapabilities {
        let mut caps = match &self.capabilities {
            Some(overrides) => overrides.apply(declared),
            None => declared,
        };
        if let Some(primary) = self.is_primary {
            caps.is_primary = primary;
        }
        caps
    }
}

/// Optional per-flag capability overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityOverrides {
    #[serde(default)]
    pub supports_member_management: Option<bool>,
    #[serde(default)]
    pub provides_role_info: Option<bool>,
    #[serde(default)]
    pub supports_group_listing: Option<bool>,
    #[serde(default)]
    pub supports_health_check: Option<bool>,
}

impl CapabilityOverrides {
    /// Merge the overrides into a declared capability set.
    pub fn apply(&self, mut caps: ProviderCapabilities) -> ProviderCapabilities {
        if let Some(v) = self.supports_member_management {
            caps.supports_member_management = v;
        }
        if let Some(v) = self.provides_role_info {
            caps.provides_role_info = v;
        }
        if let Some(v) = self.supports_group_listing {
            caps.supports_group_listing = v;
        }
        if let Some(v) = self.supports_health_check {
            caps.supports_health_check = v;
        }
        caps
    }
}

/// Circuit breaker settings; see the `circuit_breaker` module for semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_breaker_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            timeout_seconds: default_breaker_timeout(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            timeout_seconds: settings.timeout_seconds,
            half_open_max_calls: settings.half_open_max_calls,
        }
    }
}

/// Retry ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts (including the first) before a record dead-letters.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff for the first retry; doubles each attempt.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_seconds: u64,
    /// Upper bound on the computed backoff.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    /// Interval between background ledger sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_seconds: default_base_backoff(),
            max_backoff_seconds: default_max_backoff(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Idempotency cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencySettings {
    /// TTL for cached terminal results.
    #[serde(default = "default_idempotency_ttl")]
    pub default_ttl_seconds: u64,
    /// Shorter TTL for cached transient results, so pending operations can
    /// be re-driven by callers sooner than settled ones.
    #[serde(default = "default_transient_ttl")]
    pub transient_ttl_seconds: u64,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_idempotency_ttl(),
            transient_ttl_seconds: default_transient_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_breaker_timeout() -> u64 {
    60
}
fn default_half_open_max_calls() -> u32 {
    2
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_backoff() -> u64 {
    30
}
fn default_max_backoff() -> u64 {
    3600
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_idempotency_ttl() -> u64 {
    86_400
}
fn default_transient_ttl() -> u64 {
    300
}
