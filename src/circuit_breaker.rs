//! Per-provider circuit breaker state machine.
//!
//! Isolates a failing backend so that repeated transient failures stop
//! producing live calls for a cooldown period. States follow the classic
//! CLOSED → OPEN → HALF_OPEN cycle: CLOSED counts failures up to a
//! threshold, OPEN rejects everything until a timeout elapses, HALF_OPEN
//! admits a bounded number of probe calls and either closes (all probes
//! succeed) or reopens (any probe fails).
//!
//! Breaker state is in-process memory, owned by the one provider wrapper
//! it protects. In a horizontally scaled deployment each instance keeps
//! its own breaker and may open/close independently of its peers; getting
//! cluster-wide isolation requires externalizing this state to a shared
//! store, which this crate deliberately does not do.

use crate::operation::OperationResult;
use std::time::Instant;
use tokio::sync::Mutex;

/// Circuit breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before admitting probes.
    pub timeout_seconds: u64,
    /// Probe calls admitted while half-open; this many consecutive
    /// successes close the circuit again.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_seconds: 60,
            half_open_max_calls: 2,
        }
    }
}

/// Observable breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    probes_admitted: u32,
    probe_successes: u32,
}

/// Failure-isolation state machine guarding one provider backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker for the named provider.
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                probes_admitted: 0,
                probe_successes: 0,
            }),
        }
    }

    /// Ask permission to make a backend call.
    ///
    /// Returns `Err` with a synthesized TRANSIENT_ERROR result (error code
    /// [`OperationResult::CIRCUIT_BREAKER_OPEN`]) when the call must be
    /// rejected without touching the backend. Callers cannot distinguish a
    /// breaker rejection from a slow backend, which is intentional.
    pub async fn preflight(&self) -> Result<(), OperationResult> {
        let mut inner = self.inner.lock().await;
        self.maybe_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(self.rejection()),
            CircuitState::HalfOpen => {
                if inner.probes_admitted < self.config.half_open_max_calls {
                    inner.probes_admitted += 1;
                    Ok(())
                } else {
                    // Probe budget spent; wait for outstanding probes to settle.
                    Err(self.rejection())
                }
            }
        }
    }

    /// Record a successful backend call.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_max_calls {
                    log::debug!(
                        "circuit breaker for '{}' closing after {} successful probes",
                        self.provider,
                        inner.probe_successes
                    );
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.probes_admitted = 0;
                    inner.probe_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a transient backend failure.
    ///
    /// Only transient outcomes count against the breaker; permanent and
    /// not-found outcomes are caller faults, not provider-health signals.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    log::warn!(
                        "circuit breaker for '{}' opening after {} failures",
                        self.provider,
                        inner.failure_count
                    );
                    inner.state = CircuitState::Open;
                    inner.last_failure_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                log::warn!(
                    "circuit breaker for '{}' reopening after probe failure",
                    self.provider
                );
                inner.state = CircuitState::Open;
                inner.last_failure_at = Some(Instant::now());
                inner.probes_admitted = 0;
                inner.probe_successes = 0;
            }
            CircuitState::Open => {
                inner.last_failure_at = Some(Instant::now());
            }
        }
    }

    /// Current state, applying the open → half-open timeout transition.
    pub async fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().await;
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// Force the breaker back to CLOSED. Operator escape hatch.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.probes_admitted = 0;
        inner.probe_successes = 0;
    }

    fn maybe_half_open(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .last_failure_at
            .map(|at| at.elapsed().as_secs())
            .unwrap_or(u64::MAX);
        if elapsed >= self.config.timeout_seconds {
            log::debug!(
                "circuit breaker for '{}' transitioning to half-open",
                self.provider
            );
            inner.state = CircuitState::HalfOpen;
            inner.probes_admitted = 0;
            inner.probe_successes = 0;
        }
    }

    fn rejection(&self) -> OperationResult {
        OperationResult::transient(
            format!("Circuit breaker open for provider '{}'", self.provider),
            OperationResult::CIRCUIT_BREAKER_OPEN,
        )
    }
}
