//! Breaker error taxonomy.
//!
//! Callers see either the operation's own error, a timeout, or a rejection
//! because the circuit is open. Keeping them distinct lets callers layer
//! their own retry/backoff policy on top.

use thiserror::Error;

/// Error returned by [`CircuitBreaker::execute`](crate::breaker::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The call was rejected without running because the circuit is open
    /// (or a half-open trial is already in flight).
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// The operation did not finish within the per-call timeout.
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The operation (or fallback) failed; the original error is preserved.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Borrow the underlying operation error, if any.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Raised when an administrative override names an unknown state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid circuit state '{0}' (expected closed, open or half-open)")]
pub struct InvalidStateError(pub String);
