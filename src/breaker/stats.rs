//! Cumulative breaker counters and state-change history.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;

use crate::breaker::state::CircuitState;

/// Maximum number of state changes kept; oldest evicted first.
pub const STATE_HISTORY_LIMIT: usize = 100;

/// A recorded transition.
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(skip)]
    pub(crate) at: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct BreakerStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub timeouts: u64,
    pub ignored_errors: u64,
    pub state_changes: VecDeque<StateChange>,
}

impl BreakerStats {
    pub fn record_change(&mut self, from: CircuitState, to: CircuitState, at: Instant) {
        if self.state_changes.len() == STATE_HISTORY_LIMIT {
            self.state_changes.pop_front();
        }
        self.state_changes.push_back(StateChange {
            from,
            to,
            timestamp_ms: epoch_millis(),
            at,
        });
    }

    /// Instant of the oldest retained state change.
    pub fn first_change(&self) -> Option<Instant> {
        self.state_changes.front().map(|c| c.at)
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut stats = BreakerStats::default();
        let now = Instant::now();
        for i in 0..(STATE_HISTORY_LIMIT + 5) {
            let (from, to) = if i % 2 == 0 {
                (CircuitState::Closed, CircuitState::Open)
            } else {
                (CircuitState::Open, CircuitState::Closed)
            };
            stats.record_change(from, to, now);
        }
        assert_eq!(stats.state_changes.len(), STATE_HISTORY_LIMIT);
        // 105 changes alternate starting with Closed→Open; the first five were evicted
        assert_eq!(stats.state_changes[0].from, CircuitState::Open);
    }
}
