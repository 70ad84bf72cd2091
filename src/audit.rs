//! Append-only audit trail of mutation attempts.
//!
//! Every orchestrator-level attempt, first try or ledger retry, success or
//! failure, produces exactly one entry carrying the correlation id of the
//! triggering request, so the full retry history of one logical operation
//! can be reconstructed by querying on that id. The trait exposes no
//! update or delete; entries leave the store only through TTL expiry in
//! the backing database.

use crate::operation::OperationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The resource the mutation targeted, `provider:group_key`.
    pub resource_id: String,
    /// When the attempt settled.
    pub timestamp: DateTime<Utc>,
    /// Correlation id shared by every attempt of one logical operation.
    pub correlation_id: String,
    /// The member the mutation concerned.
    pub user_email: String,
    /// Operation name (`add_member`, `remove_member`).
    pub operation: String,
    /// Outcome status of this attempt.
    pub status: OperationStatus,
    /// Machine-readable error code, when the attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Outcome summary.
    pub message: String,
}

impl AuditEntry {
    /// Build the entry for one settled attempt.
    pub fn for_attempt(
        resource_id: impl Into<String>,
        correlation_id: impl Into<String>,
        user_email: impl Into<String>,
        operation: impl Into<String>,
        result: &crate::operation::OperationResult,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            timestamp: Utc::now(),
            correlation_id: correlation_id.into(),
            user_email: user_email.into(),
            operation: operation.into(),
            status: result.status,
            error_code: result.error_code.clone(),
            message: result.message.clone(),
        }
    }
}

/// Durable, append-only audit store.
pub trait AuditTrail: Send + Sync {
    /// Error type returned by store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append one entry. There is no update or delete.
    fn append(&self, entry: AuditEntry) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// All entries for one correlation id, in append order.
    fn by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send;

    /// All entries for one member email, in append order.
    fn by_user_email(
        &self,
        user_email: &str,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send;
}

#[derive(Default)]
struct AuditInner {
    entries: Vec<AuditEntry>,
    // Secondary indices, mirroring what the durable table would maintain.
    by_correlation: HashMap<String, Vec<usize>>,
    by_email: HashMap<String, Vec<usize>>,
}

/// Thread-safe in-memory audit trail for tests and single-node use.
#[derive(Clone, Default)]
pub struct InMemoryAuditTrail {
    inner: Arc<RwLock<AuditInner>>,
}

impl InMemoryAuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries appended.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether no entries have been appended.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    type Error = Infallible;

    async fn append(&self, entry: AuditEntry) -> Result<(), Infallible> {
        let mut inner = self.inner.write().await;
        let index = inner.entries.len();
        inner
            .by_correlation
            .entry(entry.correlation_id.clone())
            .or_default()
            .push(index);
        inner
            .by_email
            .entry(entry.user_email.clone())
            .or_default()
            .push(index);
        inner.entries.push(entry);
        Ok(())
    }

    async fn by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<AuditEntry>, Infallible> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_correlation
            .get(correlation_id)
            .map(|indices| indices.iter().map(|&i| inner.entries[i].clone()).collect())
            .unwrap_or_default())
    }

    async fn by_user_email(&self, user_email: &str) -> Result<Vec<AuditEntry>, Infallible> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(user_email)
            .map(|indices| indices.iter().map(|&i| inner.entries[i].clone()).collect())
            .unwrap_or_default())
    }
}
