//! Timeout enforcement for protected calls.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from operation errors
//! - A timed-out future is dropped, which cancels it at its next await point

use std::future::Future;
use std::time::Duration;

/// The guarded future did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub limit: Duration,
}

impl TimedOut {
    pub fn limit_ms(&self) -> u64 {
        self.limit.as_millis() as u64
    }
}

/// Race `fut` against a timer of `limit`.
pub async fn guarded<F>(limit: Duration, fut: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TimedOut { limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fast_future_completes() {
        let out = guarded(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_future_times_out() {
        let started = tokio::time::Instant::now();
        let out = guarded(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            7
        })
        .await;

        let err = out.unwrap_err();
        assert_eq!(err.limit_ms(), 100);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(500));
    }
}
