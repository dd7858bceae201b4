//! Status and health snapshots handed to dashboards and loggers.

use serde::Serialize;

use crate::breaker::stats::StateChange;
use crate::breaker::state::CircuitState;
use crate::config::BreakerConfig;

/// A breaker is healthy when closed and its windowed error rate is below this.
pub const HEALTHY_ERROR_RATE: f64 = 0.10;

/// Cumulative metrics plus the current window view.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub timeouts: u64,
    /// Failures excluded by the error filter.
    pub ignored_errors: u64,
    pub state_changes: Vec<StateChange>,
    pub error_rate: f64,
    pub window_size: usize,
}

/// Full snapshot returned by `CircuitBreaker::status`.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    /// Wall-clock time of the last counted failure, ms since the Unix epoch.
    pub last_failure_ms: Option<u64>,
    pub metrics: MetricsSnapshot,
    pub config: BreakerConfig,
}

/// Derived health view returned by `CircuitBreaker::health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub name: String,
    pub healthy: bool,
    pub state: CircuitState,
    pub error_rate: f64,
    pub recent_failures: usize,
    /// Time since the oldest recorded state change, 0 if there is none.
    pub uptime_ms: u64,
}

impl HealthReport {
    pub(crate) fn is_healthy(state: CircuitState, error_rate: f64) -> bool {
        state == CircuitState::Closed && error_rate < HEALTHY_ERROR_RATE
    }
}
