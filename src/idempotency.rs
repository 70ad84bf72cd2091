//! Idempotency cache for externally-triggered mutations.
//!
//! A second call with the same idempotency key inside the TTL window
//! returns the first call's result without re-invoking any provider.
//! Errors are cached too: a naive client replaying a failed request gets
//! the recorded failure back instead of hammering a failing backend. This
//! is distinct from the retry ledger, which drives *system-initiated*
//! retries of transient failures.
//!
//! The trait is the deployment seam: production points it at a shared
//! durable store (all process instances must observe the same entries for
//! the at-most-one-effective-execution guarantee to hold), while
//! [`InMemoryIdempotencyStore`] serves tests and single-node use.

use crate::operation::OperationResult;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Keyed, TTL-bounded store of previously computed operation outcomes.
pub trait IdempotencyStore: Send + Sync {
    /// Error type returned by store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the cached result for a key, if present and unexpired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<OperationResult>, Self::Error>> + Send;

    /// Cache a result under a key with the given TTL in seconds.
    fn put(
        &self,
        key: &str,
        result: &OperationResult,
        ttl_seconds: u64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Derive a deterministic idempotency key from an operation intent.
///
/// Canonical JSON (serde_json sorts object keys) hashed with SHA-256 and
/// base64url-encoded, so identical intents always produce identical keys
/// regardless of field ordering at the call site.
pub fn derive_idempotency_key(operation: &str, group: &str, email: &str) -> String {
    let canonical = serde_json::json!({
        "operation": operation,
        "group": group,
        "email": email,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Thread-safe in-memory idempotency store.
///
/// Entries are evicted lazily on read; [`purge_expired`](Self::purge_expired)
/// exists for housekeeping sweeps in long-lived processes.
#[derive(Clone, Default)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<RwLock<HashMap<String, CachedEntry>>>,
}

#[derive(Clone)]
struct CachedEntry {
    result: OperationResult,
    expires_at: Instant,
}

impl InMemoryIdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live (possibly expired, not yet evicted) entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<OperationResult>, Infallible> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.result.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired entry: evict under the write lock.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= now {
                entries.remove(key);
            }
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        result: &OperationResult,
        ttl_seconds: u64,
    ) -> Result<(), Infallible> {
        let entry = CachedEntry {
            result: result.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_and_returns_identical_result() {
        let store = InMemoryIdempotencyStore::new();
        let result = OperationResult::success("added alice@example.com");
        store.put("k1", &result, 60).await.unwrap();

        let hit = store.get("k1").await.unwrap().unwrap();
        assert_eq!(hit, result);
        let bytes_a = serde_json::to_vec(&hit).unwrap();
        let bytes_b = serde_json::to_vec(&result).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[tokio::test]
    async fn errors_are_cached_too() {
        let store = InMemoryIdempotencyStore::new();
        let failure = OperationResult::permanent("bad email", OperationResult::INVALID_INPUT);
        store.put("k2", &failure, 60).await.unwrap();
        let hit = store.get("k2").await.unwrap().unwrap();
        assert_eq!(hit.status, failure.status);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let store = InMemoryIdempotencyStore::new();
        store
            .put("k3", &OperationResult::success("ok"), 0)
            .await
            .unwrap();
        assert!(store.get("k3").await.unwrap().is_none());
        // Lazy eviction removed the entry.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn purge_removes_expired_entries_only() {
        let store = InMemoryIdempotencyStore::new();
        store
            .put("stale", &OperationResult::success("ok"), 0)
            .await
            .unwrap();
        store
            .put("fresh", &OperationResult::success("ok"), 300)
            .await
            .unwrap();
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[test]
    fn derived_keys_are_deterministic_and_distinct() {
        let a = derive_idempotency_key("add_member", "devteam", "alice@example.com");
        let b = derive_idempotency_key("add_member", "devteam", "alice@example.com");
        let c = derive_idempotency_key("remove_member", "devteam", "alice@example.com");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // SHA-256 as unpadded base64url.
        assert_eq!(a.len(), 43);
    }
}
