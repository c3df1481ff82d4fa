//! # Circuit Breaker Module
//!
//! Stops calling the AI combine collaborator after it has failed repeatedly,
//! so batch adds go straight to the separate-insert fallback instead of
//! waiting on a service that is down.
//!
//! - **Closed**: calls pass through
//! - **Open**: failure threshold reached, calls are skipped
//! - **Half-open**: reset time elapsed, the next call is let through

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker for AI combine calls
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    ///
    /// ```rust
    /// use pantry::circuit_breaker::CircuitBreaker;
    /// use pantry::config::RecoveryConfig;
    ///
    /// let breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether calls should currently be skipped
    ///
    /// Resets to closed once `circuit_breaker_reset_secs` have passed since the
    /// last failure.
    pub fn is_open(&self) -> bool {
        let mut state = self.state();
        if state.failure_count < self.config.circuit_breaker_threshold {
            return false;
        }
        match state.last_failure_time {
            Some(last) if last.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) => true,
            _ => {
                state.failure_count = 0;
                state.last_failure_time = None;
                false
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a successful call, closing the circuit
    pub fn record_success(&self) {
        let mut state = self.state();
        state.failure_count = 0;
        state.last_failure_time = None;
    }

    /// Consecutive failures seen so far
    pub fn failure_count(&self) -> u32 {
        self.state().failure_count
    }
}
