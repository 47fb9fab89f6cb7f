//! Circuit breaker guarding calls to a backend that may be down.
//!
//! The bootstrapper wraps every provisioning step in a breaker: after a run
//! of transient failures the breaker opens and calls fail fast with
//! [`StorageError::CircuitOpen`] until a cool-down elapses, then a single
//! trial call is let through.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  failure_threshold  ┌──────┐  recovery_timeout  ┌──────────┐
//! │ Closed │ ──────reached─────→ │ Open │ ────elapsed─────→  │ HalfOpen │
//! └────────┘                     └──────┘ ←──trial fails──── └──────────┘
//!      ↑                                                          │
//!      └──────────────── success_threshold met ───────────────────┘
//! ```
//!
//! Time is read from [`tokio::time::Instant`], so tests can drive the
//! cool-down with a paused clock.

use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{ConfigError, StorageError, StorageResult};

/// Default number of consecutive failures before opening the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default duration the circuit stays open before admitting a trial call.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of successful trial calls required to close the circuit.
pub const DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD: u32 = 1;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation. All calls pass through.
    Closed,
    /// Calls are rejected without contacting the backend.
    Open {
        /// When the circuit admits a trial call.
        until: Instant,
    },
    /// One trial call at a time is admitted.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open { .. } => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    failure_threshold: u32,
    #[serde(with = "humantime_serde", default = "default_recovery_timeout")]
    recovery_timeout: Duration,
    #[serde(default = "default_half_open_success_threshold")]
    half_open_success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_recovery_timeout() -> Duration {
    DEFAULT_RECOVERY_TIMEOUT
}

fn default_half_open_success_threshold() -> u32 {
    DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

#[bon::bon]
impl CircuitBreakerConfig {
    /// Creates a new circuit breaker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `failure_threshold` is zero
    /// - `recovery_timeout` is zero
    /// - `half_open_success_threshold` is zero
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_FAILURE_THRESHOLD)] failure_threshold: u32,
        #[builder(default = DEFAULT_RECOVERY_TIMEOUT)] recovery_timeout: Duration,
        #[builder(default = DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD)] half_open_success_threshold: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { failure_threshold, recovery_timeout, half_open_success_threshold };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configurations bypass the builder, so loaders call this
    /// before use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first zero-valued field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "failure_threshold",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::MustBePositive {
                field: "recovery_timeout",
                value: "0s".into(),
            });
        }
        if self.half_open_success_threshold == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "half_open_success_threshold",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Returns the failure threshold.
    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Returns the recovery timeout.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Returns the half-open success threshold.
    #[must_use]
    pub fn half_open_success_threshold(&self) -> u32 {
        self.half_open_success_threshold
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_half_open_successes: u32,
    trial_in_flight: bool,
    config: CircuitBreakerConfig,

    state_transitions: u64,
    fast_fail_count: u64,
    recovery_attempts: u64,
}

impl Inner {
    fn open(&mut self) {
        self.state = CircuitState::Open { until: Instant::now() + self.config.recovery_timeout };
        self.consecutive_half_open_successes = 0;
        self.trial_in_flight = false;
        self.state_transitions += 1;
    }
}

/// Thread-safe circuit breaker.
///
/// All state is behind a `parking_lot::Mutex` with short critical sections
/// (no I/O under the lock). Clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

/// A snapshot of circuit breaker metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    /// Current circuit state.
    pub state: CircuitState,
    /// Total number of state transitions since creation.
    pub state_transitions: u64,
    /// Total number of calls rejected by the open circuit.
    pub fast_fail_count: u64,
    /// Total number of trial calls admitted while half-open.
    pub recovery_attempts: u64,
    /// Current consecutive failure count.
    pub consecutive_failures: u32,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker. `name` labels its log events.
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_half_open_successes: 0,
                trial_in_flight: false,
                config,
                state_transitions: 0,
                fast_fail_count: 0,
                recovery_attempts: 0,
            })),
        }
    }

    /// Returns the breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the breaker to admit one call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CircuitOpen`] if the circuit is open, or if it
    /// is half-open and its trial call is still running.
    pub fn try_acquire(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_half_open_successes = 0;
                    inner.trial_in_flight = true;
                    inner.state_transitions += 1;
                    inner.recovery_attempts += 1;
                    tracing::info!(
                        breaker = %self.name,
                        previous_state = "open",
                        new_state = "half_open",
                        "circuit breaker admitting trial call",
                    );
                    Ok(())
                } else {
                    inner.fast_fail_count += 1;
                    Err(StorageError::circuit_open(until - now))
                }
            },
            CircuitState::HalfOpen if inner.trial_in_flight => {
                inner.fast_fail_count += 1;
                Err(StorageError::circuit_open(Duration::ZERO))
            },
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                inner.recovery_attempts += 1;
                Ok(())
            },
        }
    }

    /// Records a successful call, closing the circuit once enough trial
    /// calls have succeeded.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            },
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                inner.consecutive_half_open_successes += 1;
                if inner.consecutive_half_open_successes >= inner.config.half_open_success_threshold
                {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_half_open_successes = 0;
                    inner.state_transitions += 1;
                    tracing::info!(
                        breaker = %self.name,
                        previous_state = "half_open",
                        new_state = "closed",
                        "circuit breaker closed after successful trial",
                    );
                }
            },
            CircuitState::Open { .. } => {},
        }
    }

    /// Records a failed call, opening the circuit at the threshold.
    ///
    /// Only transient failures should be recorded. Permanent errors (e.g.
    /// already-exists) say nothing about backend health.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= inner.config.failure_threshold {
                    inner.open();
                    tracing::warn!(
                        breaker = %self.name,
                        consecutive_failures = inner.consecutive_failures,
                        recovery_timeout_secs = inner.config.recovery_timeout.as_secs(),
                        "circuit breaker opened after consecutive transient failures",
                    );
                }
            },
            CircuitState::HalfOpen => {
                inner.open();
                tracing::warn!(
                    breaker = %self.name,
                    previous_state = "half_open",
                    new_state = "open",
                    recovery_timeout_secs = inner.config.recovery_timeout.as_secs(),
                    "circuit breaker re-opened after trial failure",
                );
            },
            CircuitState::Open { .. } => {},
        }
    }

    /// Runs `operation` through the breaker.
    ///
    /// Transient errors count as failures; every other outcome, including
    /// permanent errors, proves the backend answered and counts as success.
    /// A call whose future is dropped before it resolves counts as a failure,
    /// like a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CircuitOpen`] without running `operation` if
    /// the breaker rejects the call, otherwise the operation's own error.
    pub async fn call<F, Fut, T>(&self, operation: F) -> StorageResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.try_acquire()?;
        let mut guard = CallGuard { breaker: self, settled: false };
        let result = operation().await;
        guard.settled = true;
        match &result {
            Err(err) if err.is_transient() => self.record_failure(),
            _ => self.record_success(),
        }
        result
    }

    /// Returns the current state of the circuit breaker.
    ///
    /// An open circuit whose cool-down has elapsed reads as half-open
    /// without transitioning.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
            other => other,
        }
    }

    /// Returns a snapshot of circuit breaker metrics.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: match inner.state {
                CircuitState::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
                other => other,
            },
            state_transitions: inner.state_transitions,
            fast_fail_count: inner.fast_fail_count,
            recovery_attempts: inner.recovery_attempts,
            consecutive_failures: inner.consecutive_failures,
        }
    }
}

/// Records a failure if an admitted call is dropped before it completes, so
/// an abandoned half-open trial does not keep the circuit stuck.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(breaker = %self.breaker.name, "admitted call dropped before completing");
            self.breaker.record_failure();
        }
    }
}
