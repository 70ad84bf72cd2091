//! Shared fixtures for integration tests.
//!
//! Provides a scriptable fake provider and a fully wired engine over the
//! in-memory stores, so suites can drive the orchestrator and sweeper
//! without any real backend.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use group_sync::{
    GroupProvider, GroupSyncConfig, IdempotencySettings, InMemoryAuditTrail,
    InMemoryIdempotencyStore, InMemoryRetryLedger, OperationResult, ProviderCapabilities,
    ProviderCatalog, ProviderError, ProviderRegistry, ProviderSettings, ReconciliationOrchestrator,
    RetrySettings, RetrySweeper,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Observable call log and outcome script for one fake provider.
#[derive(Default)]
pub struct ScriptState {
    pub add_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    /// Queued outcomes for add_member; empty queue means success.
    pub add_script: Mutex<VecDeque<Result<OperationResult, ProviderError>>>,
    /// Queued outcomes for remove_member; empty queue means success.
    pub remove_script: Mutex<VecDeque<Result<OperationResult, ProviderError>>>,
    /// Last `(group_key, email)` seen by add_member.
    pub last_add: Mutex<Option<(String, String)>>,
}

impl ScriptState {
    pub fn queue_add(&self, outcome: Result<OperationResult, ProviderError>) {
        self.add_script.lock().unwrap().push_back(outcome);
    }

    pub fn queue_remove(&self, outcome: Result<OperationResult, ProviderError>) {
        self.remove_script.lock().unwrap().push_back(outcome);
    }

    /// Queue `n` timeouts in a row.
    pub fn queue_timeouts(&self, n: usize) {
        for _ in 0..n {
            self.queue_add(Err(ProviderError::Timeout {
                message: "backend slow".to_string(),
            }));
        }
    }
}

/// Fake provider driven by a [`ScriptState`].
pub struct ScriptedProvider {
    name: String,
    primary: bool,
    state: Arc<ScriptState>,
}

impl ScriptedProvider {
    pub fn new(name: &str, primary: bool, state: Arc<ScriptState>) -> Self {
        Self {
            name: name.to_string(),
            primary,
            state,
        }
    }
}

impl GroupProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            is_primary: self.primary,
            ..Default::default()
        }
    }

    async fn add_member(
        &self,
        group_key: &str,
        email: &str,
    ) -> Result<OperationResult, ProviderError> {
        self.state.add_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_add.lock().unwrap() = Some((group_key.to_string(), email.to_string()));
        match self.state.add_script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(OperationResult::success(format!(
                "added {email} to {group_key}"
            ))),
        }
    }

    async fn remove_member(
        &self,
        group_key: &str,
        email: &str,
    ) -> Result<OperationResult, ProviderError> {
        self.state.remove_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.remove_script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(OperationResult::success(format!(
                "removed {email} from {group_key}"
            ))),
        }
    }

    async fn list_members(&self, _group_key: &str) -> Result<OperationResult, ProviderError> {
        Ok(OperationResult::success_with_data(
            "members",
            serde_json::json!([]),
        ))
    }

    async fn list_groups(&self) -> Result<OperationResult, ProviderError> {
        Ok(OperationResult::success_with_data(
            "groups",
            serde_json::json!([]),
        ))
    }

    async fn health_check(&self) -> Result<OperationResult, ProviderError> {
        Ok(OperationResult::success("healthy"))
    }
}

type Orchestrator = ReconciliationOrchestrator<
    InMemoryIdempotencyStore,
    InMemoryRetryLedger,
    InMemoryAuditTrail,
>;
type Sweeper =
    RetrySweeper<InMemoryRetryLedger, InMemoryIdempotencyStore, InMemoryAuditTrail>;

/// Fully wired engine: primary `google`, secondary `aws`, in-memory stores.
pub struct TestEngine {
    pub registry: Arc<ProviderRegistry>,
    pub orchestrator: Orchestrator,
    pub sweeper: Sweeper,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
    pub ledger: Arc<InMemoryRetryLedger>,
    pub audit: Arc<InMemoryAuditTrail>,
    pub google: Arc<ScriptState>,
    pub aws: Arc<ScriptState>,
}

/// Retry settings tuned for tests: three total attempts, short backoff.
pub fn test_retry_settings() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_backoff_seconds: 10,
        max_backoff_seconds: 60,
        sweep_interval_seconds: 1,
    }
}

pub fn engine() -> TestEngine {
    let _ = env_logger::builder().is_test(true).try_init();

    let google = Arc::new(ScriptState::default());
    let aws = Arc::new(ScriptState::default());

    let mut catalog = ProviderCatalog::new();
    {
        let google = google.clone();
        catalog.register("google", move |_s| {
            Ok(ScriptedProvider::new("google", true, google.clone()))
        });
    }
    {
        let aws = aws.clone();
        catalog.register("aws", move |_s| {
            Ok(ScriptedProvider::new("aws", false, aws.clone()))
        });
    }

    let mut config = GroupSyncConfig::default();
    config
        .providers
        .insert("google".to_string(), ProviderSettings::default());
    config
        .providers
        .insert("aws".to_string(), ProviderSettings::default());

    let registry = Arc::new(ProviderRegistry::activate(&catalog, &config).unwrap());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());
    let ledger = Arc::new(InMemoryRetryLedger::new());
    let audit = Arc::new(InMemoryAuditTrail::new());

    let retry = test_retry_settings();
    let idem_settings = IdempotencySettings::default();

    let orchestrator = ReconciliationOrchestrator::new(
        registry.clone(),
        idempotency.clone(),
        ledger.clone(),
        audit.clone(),
        retry.clone(),
        idem_settings.clone(),
    );
    let sweeper = RetrySweeper::new(
        registry.clone(),
        ledger.clone(),
        idempotency.clone(),
        audit.clone(),
        retry,
        idem_settings,
    );

    TestEngine {
        registry,
        orchestrator,
        sweeper,
        idempotency,
        ledger,
        audit,
        google,
        aws,
    }
}
