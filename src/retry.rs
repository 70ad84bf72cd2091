//! Durable retry ledger and its background sweeper.
//!
//! Transient failures do not block the caller: the failed operation's
//! intent is enqueued as a [`RetryRecord`] and re-driven by a polling
//! sweep with exponential backoff until it settles as SUCCEEDED or, after
//! the configured attempt budget, DEAD_LETTER. Dead letters are retained
//! for operator inspection, never silently discarded. Permanent errors
//! never enter the ledger.
//!
//! Multiple process instances may sweep concurrently; [`RetryLedger::claim`]
//! is a conditional update so two sweepers racing on the same due record
//! cannot both execute it. Losing the race is fine (the winner processes
//! the record); executing twice is not.

use crate::audit::{AuditEntry, AuditTrail};
use crate::config::{IdempotencySettings, RetrySettings};
use crate::error::{GroupSyncError, GroupSyncResult};
use crate::idempotency::IdempotencyStore;
use crate::operation::{OperationResult, OperationStatus};
use crate::registry::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use uuid::Uuid;

/// How long a claimed record stays invisible to other sweepers.
const CLAIM_LEASE_SECONDS: u64 = 300;

/// Mutations the ledger knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    AddMember,
    RemoveMember,
}

impl MutationKind {
    /// Operation name used in audit entries and key derivation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddMember => "add_member",
            Self::RemoveMember => "remove_member",
        }
    }
}

/// Serialized intent of one not-yet-settled operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationIntent {
    /// Which mutation to replay.
    pub operation: MutationKind,
    /// Target provider name.
    pub provider: String,
    /// Provider-side group key.
    pub group_key: String,
    /// Normalized member email.
    pub email: String,
    /// Correlation id of the triggering request.
    pub correlation_id: String,
    /// Idempotency key under which the final outcome is cached.
    pub idempotency_key: String,
}

/// Lifecycle states of a retry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStatus {
    /// Awaiting (re-)execution.
    Active,
    /// Eventually succeeded; retained until TTL expiry.
    Succeeded,
    /// Retry budget exhausted or outcome permanent; parked for inspection.
    DeadLetter,
}

/// Durable retry queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRecord {
    /// Opaque record key.
    pub record_id: String,
    pub status: RetryStatus,
    /// Attempts already made, including the original one.
    pub attempt_count: u32,
    /// Epoch seconds at which the record becomes due.
    pub next_retry_at: u64,
    pub payload: OperationIntent,
    /// Epoch seconds after which the record may be expired.
    pub expires_at: u64,
}

/// Current time as epoch seconds.
pub fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Exponential backoff for the given attempt count, bounded by the
/// configured maximum. Attempt 1 waits the base delay.
pub fn backoff_seconds(settings: &RetrySettings, attempt_count: u32) -> u64 {
    let exponent = attempt_count.saturating_sub(1).min(32);
    settings
        .base_backoff_seconds
        .saturating_mul(1u64 << exponent)
        .min(settings.max_backoff_seconds)
}

/// Durable queue of not-yet-settled operations.
pub trait RetryLedger: Send + Sync {
    /// Error type returned by ledger operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a new ACTIVE record for a transient failure.
    fn enqueue(
        &self,
        intent: OperationIntent,
        next_retry_at: u64,
        expires_at: u64,
    ) -> impl Future<Output = Result<RetryRecord, Self::Error>> + Send;

    /// ACTIVE records due at or before `now`, up to `limit`.
    fn due(
        &self,
        now: u64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RetryRecord>, Self::Error>> + Send;

    /// Conditionally claim a due record for execution.
    ///
    /// Succeeds only when the record is still ACTIVE and due; on success
    /// the record's due time is pushed out by a lease so concurrent
    /// sweepers see it as not due. Returns `None` when the race was lost.
    fn claim(
        &self,
        record_id: &str,
        now: u64,
    ) -> impl Future<Output = Result<Option<RetryRecord>, Self::Error>> + Send;

    /// Settle a record as eventually succeeded.
    fn mark_succeeded(
        &self,
        record_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Re-schedule a still-transient record.
    fn mark_retry(
        &self,
        record_id: &str,
        attempt_count: u32,
        next_retry_at: u64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Park a record as a dead letter.
    fn mark_dead_letter(
        &self,
        record_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// All dead-lettered records, for operator inspection.
    fn dead_letters(&self) -> impl Future<Output = Result<Vec<RetryRecord>, Self::Error>> + Send;
}

/// Thread-safe in-memory ledger for tests and single-node use.
#[derive(Clone, Default)]
pub struct InMemoryRetryLedger {
    records: Arc<RwLock<HashMap<String, RetryRecord>>>,
}

impl InMemoryRetryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch one record by id.
    pub async fn get(&self, record_id: &str) -> Option<RetryRecord> {
        self.records.read().await.get(record_id).cloned()
    }

    /// Drop settled records past their TTL; returns how many were removed.
    pub async fn purge_expired(&self, now: u64) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.status == RetryStatus::Active || r.expires_at > now);
        before - records.len()
    }
}

impl RetryLedger for InMemoryRetryLedger {
    type Error = Infallible;

    async fn enqueue(
        &self,
        intent: OperationIntent,
        next_retry_at: u64,
        expires_at: u64,
    ) -> Result<RetryRecord, Infallible> {
        let record = RetryRecord {
            record_id: Uuid::new_v4().to_string(),
            status: RetryStatus::Active,
            attempt_count: 1,
            next_retry_at,
            payload: intent,
            expires_at,
        };
        self.records
            .write()
            .await
            .insert(record.record_id.clone(), record.clone());
        Ok(record)
    }

    async fn due(&self, now: u64, limit: usize) -> Result<Vec<RetryRecord>, Infallible> {
        let records = self.records.read().await;
        let mut due: Vec<RetryRecord> = records
            .values()
            .filter(|r| r.status == RetryStatus::Active && r.next_retry_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_retry_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, record_id: &str, now: u64) -> Result<Option<RetryRecord>, Infallible> {
        let mut records = self.records.write().await;
        match records.get_mut(record_id) {
            Some(record) if record.status == RetryStatus::Active && record.next_retry_at <= now => {
                let claimed = record.clone();
                record.next_retry_at = now + CLAIM_LEASE_SECONDS;
                Ok(Some(claimed))
            }
            _ => Ok(None),
        }
    }

    async fn mark_succeeded(&self, record_id: &str) -> Result<(), Infallible> {
        if let Some(record) = self.records.write().await.get_mut(record_id) {
            record.status = RetryStatus::Succeeded;
        }
        Ok(())
    }

    async fn mark_retry(
        &self,
        record_id: &str,
        attempt_count: u32,
        next_retry_at: u64,
    ) -> Result<(), Infallible> {
        if let Some(record) = self.records.write().await.get_mut(record_id) {
            record.attempt_count = attempt_count;
            record.next_retry_at = next_retry_at;
        }
        Ok(())
    }

    async fn mark_dead_letter(&self, record_id: &str) -> Result<(), Infallible> {
        if let Some(record) = self.records.write().await.get_mut(record_id) {
            record.status = RetryStatus::DeadLetter;
        }
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<RetryRecord>, Infallible> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.status == RetryStatus::DeadLetter)
            .cloned()
            .collect())
    }
}

/// Polling background worker that re-drives due retry records.
pub struct RetrySweeper<L, C, A> {
    registry: Arc<ProviderRegistry>,
    ledger: Arc<L>,
    idempotency: Arc<C>,
    audit: Arc<A>,
    retry: RetrySettings,
    idempotency_settings: IdempotencySettings,
}

impl<L, C, A> RetrySweeper<L, C, A>
where
    L: RetryLedger + 'static,
    C: IdempotencyStore + 'static,
    A: AuditTrail + 'static,
{
    /// Assemble a sweeper over shared stores.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: Arc<L>,
        idempotency: Arc<C>,
        audit: Arc<A>,
        retry: RetrySettings,
        idempotency_settings: IdempotencySettings,
    ) -> Self {
        Self {
            registry,
            ledger,
            idempotency,
            audit,
            retry,
            idempotency_settings,
        }
    }

    /// Run the sweep loop until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.retry.sweep_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once(epoch_now()).await {
                    log::error!("retry sweep failed: {e}");
                }
            }
        })
    }

    /// Process every due record once; returns how many records were executed.
    pub async fn sweep_once(&self, now: u64) -> GroupSyncResult<usize> {
        let due = self
            .ledger
            .due(now, 100)
            .await
            .map_err(GroupSyncError::store)?;
        let mut executed = 0;
        for record in due {
            let Some(claimed) = self
                .ledger
                .claim(&record.record_id, now)
                .await
                .map_err(GroupSyncError::store)?
            else {
                // Another instance won the claim.
                continue;
            };
            self.execute(claimed, now).await?;
            executed += 1;
        }
        Ok(executed)
    }

    async fn execute(&self, record: RetryRecord, now: u64) -> GroupSyncResult<()> {
        let intent = &record.payload;
        let attempt = record.attempt_count + 1;

        let result = match self.registry.handle(&intent.provider) {
            Ok(handle) => match intent.operation {
                MutationKind::AddMember => {
                    handle.add_member(&intent.group_key, &intent.email).await
                }
                MutationKind::RemoveMember => {
                    handle.remove_member(&intent.group_key, &intent.email).await
                }
            },
            // Provider vanished from the registry since enqueue.
            Err(e) => OperationResult::permanent(e.to_string(), OperationResult::UNKNOWN_PROVIDER),
        };

        self.audit
            .append(AuditEntry::for_attempt(
                format!("{}:{}", intent.provider, intent.group_key),
                intent.correlation_id.clone(),
                intent.email.clone(),
                intent.operation.as_str(),
                &result,
            ))
            .await
            .map_err(GroupSyncError::store)?;

        match result.status {
            OperationStatus::TransientError => {
                if attempt >= self.retry.max_attempts {
                    log::warn!(
                        "retry record {} exhausted {} attempts, dead-lettering",
                        record.record_id,
                        attempt
                    );
                    self.ledger
                        .mark_dead_letter(&record.record_id)
                        .await
                        .map_err(GroupSyncError::store)?;
                } else {
                    let delay =
                        backoff_seconds(&self.retry, attempt).max(result.retry_after.unwrap_or(0));
                    self.ledger
                        .mark_retry(&record.record_id, attempt, now + delay)
                        .await
                        .map_err(GroupSyncError::store)?;
                }
            }
            OperationStatus::Success => {
                self.idempotency
                    .put(
                        &intent.idempotency_key,
                        &result,
                        self.idempotency_settings.default_ttl_seconds,
                    )
                    .await
                    .map_err(GroupSyncError::store)?;
                self.ledger
                    .mark_succeeded(&record.record_id)
                    .await
                    .map_err(GroupSyncError::store)?;
                log::info!(
                    "retry record {} settled successfully after {} attempts",
                    record.record_id,
                    attempt
                );
            }
            // Terminal failure on a retry: park for inspection, never re-run.
            _ => {
                self.idempotency
                    .put(
                        &intent.idempotency_key,
                        &result,
                        self.idempotency_settings.default_ttl_seconds,
                    )
                    .await
                    .map_err(GroupSyncError::store)?;
                self.ledger
                    .mark_dead_letter(&record.record_id)
                    .await
                    .map_err(GroupSyncError::store)?;
                log::warn!(
                    "retry record {} settled with terminal status {:?}",
                    record.record_id,
                    result.status
                );
            }
        }
        Ok(())
    }
}
