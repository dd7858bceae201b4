//! Circuit state machine states.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: trial calls decide whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      counted failure, volume reached, failures >= threshold, error rate > 50%
//! Open → Half-Open:   reset timeout elapsed since the last counted failure
//! Half-Open → Closed: success_threshold successes
//! Half-Open → Open:   any counted failure
//! any → any:          administrative override (force_state)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::breaker::error::InvalidStateError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// All legal states, in gauge order.
    pub const ALL: [CircuitState; 3] = [
        CircuitState::Closed,
        CircuitState::HalfOpen,
        CircuitState::Open,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    /// Numeric value exported on the state gauge (0 closed, 1 half-open, 2 open).
    pub fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = InvalidStateError;

    /// Accepts `closed`, `open`, `half-open` in any case, with `_` or no separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "closed" => Ok(CircuitState::Closed),
            "open" => Ok(CircuitState::Open),
            "half-open" | "halfopen" => Ok(CircuitState::HalfOpen),
            _ => Err(InvalidStateError(s.to_string())),
        }
    }
}
