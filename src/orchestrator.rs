//! Top-level reconciliation orchestrator.
//!
//! Accepts member mutation intents from the command layer and runs them
//! through the full pipeline: idempotency cache (dedupe), identifier
//! mapper (canonical name → provider group key), the circuit-breaker
//! wrapped provider, then the audit trail and, for transient failures,
//! the retry ledger. The caller always gets an answer immediately;
//! eventual delivery of transient failures happens asynchronously in the
//! retry sweeper.

use crate::audit::{AuditEntry, AuditTrail};
use crate::config::{IdempotencySettings, RetrySettings};
use crate::error::{GroupSyncError, GroupSyncResult};
use crate::idempotency::{IdempotencyStore, derive_idempotency_key};
use crate::mapper::parse_primary_group_name;
use crate::operation::{OperationResult, OperationStatus};
use crate::registry::ProviderRegistry;
use crate::retry::{MutationKind, OperationIntent, RetryLedger, backoff_seconds, epoch_now};
use crate::types::normalize_email;
use std::sync::Arc;

/// Retention for settled ledger records, relative to enqueue time.
const LEDGER_RECORD_TTL_SECONDS: u64 = 14 * 24 * 3600;

/// Orchestrates cross-provider group mutations.
///
/// Generic over its three durable stores so deployments can plug in
/// shared backing tables; all instances of a horizontally scaled service
/// must share the same stores for the idempotency and delivery guarantees
/// to hold.
pub struct ReconciliationOrchestrator<C, L, A> {
    registry: Arc<ProviderRegistry>,
    idempotency: Arc<C>,
    ledger: Arc<L>,
    audit: Arc<A>,
    retry: RetrySettings,
    idempotency_settings: IdempotencySettings,
}

impl<C, L, A> ReconciliationOrchestrator<C, L, A>
where
    C: IdempotencyStore,
    L: RetryLedger,
    A: AuditTrail,
{
    /// Assemble an orchestrator over an activated registry and shared stores.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        idempotency: Arc<C>,
        ledger: Arc<L>,
        audit: Arc<A>,
        retry: RetrySettings,
        idempotency_settings: IdempotencySettings,
    ) -> Self {
        Self {
            registry,
            idempotency,
            ledger,
            audit,
            retry,
            idempotency_settings,
        }
    }

    /// Add a member to a group identified by its canonical name.
    ///
    /// A repeated call with the same idempotency key inside the TTL window
    /// returns the first call's result without touching any provider. A
    /// transient failure is returned immediately and retried asynchronously.
    pub async fn add_member(
        &self,
        canonical_group: &str,
        email: &str,
        correlation_id: &str,
        idempotency_key: Option<&str>,
    ) -> GroupSyncResult<OperationResult> {
        self.mutate(
            MutationKind::AddMember,
            canonical_group,
            email,
            correlation_id,
            idempotency_key,
        )
        .await
    }

    /// Remove a member from a group identified by its canonical name.
    pub async fn remove_member(
        &self,
        canonical_group: &str,
        email: &str,
        correlation_id: &str,
        idempotency_key: Option<&str>,
    ) -> GroupSyncResult<OperationResult> {
        self.mutate(
            MutationKind::RemoveMember,
            canonical_group,
            email,
            correlation_id,
            idempotency_key,
        )
        .await
    }

    /// List members of a group. Read-only: bypasses the idempotency cache,
    /// retry ledger, and audit trail.
    pub async fn list_members(&self, canonical_group: &str) -> GroupSyncResult<OperationResult> {
        let (provider, group_key) = self.resolve_target(canonical_group);
        let handle = self.registry.handle(&provider)?;
        Ok(handle.list_members(&group_key).await)
    }

    /// List groups of one provider, or of the primary when `provider` is `None`.
    pub async fn list_groups(&self, provider: Option<&str>) -> GroupSyncResult<OperationResult> {
        let handle = match provider {
            Some(name) => self.registry.handle(name)?,
            None => self.registry.primary_handle(),
        };
        Ok(handle.list_groups().await)
    }

    /// Probe one provider's backend health.
    pub async fn health_check(&self, provider: &str) -> GroupSyncResult<OperationResult> {
        let handle = self.registry.handle(provider)?;
        Ok(handle.health_check().await)
    }

    async fn mutate(
        &self,
        kind: MutationKind,
        canonical_group: &str,
        email: &str,
        correlation_id: &str,
        idempotency_key: Option<&str>,
    ) -> GroupSyncResult<OperationResult> {
        let key = match idempotency_key {
            Some(key) => key.to_string(),
            None => derive_idempotency_key(kind.as_str(), canonical_group, email),
        };

        if let Some(cached) = self
            .idempotency
            .get(&key)
            .await
            .map_err(GroupSyncError::store)?
        {
            log::debug!(
                "idempotency hit for key {key} (correlation {correlation_id}), short-circuiting"
            );
            return Ok(cached);
        }

        let (provider, group_key) = self.resolve_target(canonical_group);
        let result = self.attempt(kind, &provider, &group_key, email).await?;

        // The audit join key must match what providers operate on.
        let audited_email = normalize_email(email).unwrap_or_else(|_| email.to_string());
        self.audit
            .append(AuditEntry::for_attempt(
                format!("{provider}:{group_key}"),
                correlation_id,
                audited_email.clone(),
                kind.as_str(),
                &result,
            ))
            .await
            .map_err(GroupSyncError::store)?;

        if result.status == OperationStatus::TransientError {
            // Shorter TTL: the pending outcome should not mask the settled
            // one for longer than the retry horizon.
            self.idempotency
                .put(&key, &result, self.idempotency_settings.transient_ttl_seconds)
                .await
                .map_err(GroupSyncError::store)?;

            let now = epoch_now();
            let delay =
                backoff_seconds(&self.retry, 1).max(result.retry_after.unwrap_or(0));
            let record = self
                .ledger
                .enqueue(
                    OperationIntent {
                        operation: kind,
                        provider: provider.clone(),
                        group_key,
                        email: audited_email,
                        correlation_id: correlation_id.to_string(),
                        idempotency_key: key,
                    },
                    now + delay,
                    now + LEDGER_RECORD_TTL_SECONDS,
                )
                .await
                .map_err(GroupSyncError::store)?;
            log::info!(
                "transient failure on {} for correlation {correlation_id}, queued retry record {}",
                kind.as_str(),
                record.record_id
            );
        } else {
            self.idempotency
                .put(&key, &result, self.idempotency_settings.default_ttl_seconds)
                .await
                .map_err(GroupSyncError::store)?;
        }

        Ok(result)
    }

    async fn attempt(
        &self,
        kind: MutationKind,
        provider: &str,
        group_key: &str,
        email: &str,
    ) -> GroupSyncResult<OperationResult> {
        let active = self
            .registry
            .get(provider)
            .ok_or_else(|| GroupSyncError::UnknownProvider(provider.to_string()))?;

        if !active.capabilities().supports_member_management {
            return Ok(OperationResult::permanent(
                format!("Provider '{provider}' does not support member management"),
                "UNSUPPORTED_OPERATION",
            ));
        }

        let handle = active.handle();
        let result = match kind {
            MutationKind::AddMember => handle.add_member(group_key, email).await,
            MutationKind::RemoveMember => handle.remove_member(group_key, email).await,
        };
        Ok(result)
    }

    /// Resolve a canonical group name to `(provider, group_key)`.
    ///
    /// A prefix owned by a secondary provider routes to that provider with
    /// the bare canonical remainder as the group key; everything else,
    /// including the primary's own prefix, routes to the primary with the
    /// name unchanged.
    fn resolve_target(&self, canonical_group: &str) -> (String, String) {
        let parsed = parse_primary_group_name(canonical_group, &self.registry);
        if !parsed.prefix.is_empty() {
            if let Some(owner) = self.registry.provider_for_prefix(&parsed.prefix) {
                if !self.registry.is_primary(owner) {
                    return (owner.to_string(), parsed.canonical);
                }
            }
        }
        (
            self.registry.primary_name().to_string(),
            canonical_group.to_string(),
        )
    }
}
