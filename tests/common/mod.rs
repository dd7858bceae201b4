//! Shared helpers for breaker integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_circuit::breaker::{BreakerError, BreakerEvent, Subscription};
use agent_circuit::CircuitBreaker;
use thiserror::Error;

/// Errors returned by the fake dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("dependency unavailable")]
    Unavailable,
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type CallResult<T> = Result<T, BreakerError<TestError>>;

/// Filter that keeps validation errors out of breaker statistics.
pub fn ignore_validation(err: &(dyn std::error::Error + 'static)) -> bool {
    !matches!(err.downcast_ref::<TestError>(), Some(TestError::Validation(_)))
}

/// Call that fails with `Unavailable` after `delay_ms`.
pub async fn fail_after(breaker: &CircuitBreaker, delay_ms: u64) -> CallResult<u32> {
    breaker
        .execute(|| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Err(TestError::Unavailable)
        })
        .await
}

/// Call that succeeds with 42 after `delay_ms`.
pub async fn succeed_after(breaker: &CircuitBreaker, delay_ms: u64) -> CallResult<u32> {
    breaker
        .execute(|| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(42)
        })
        .await
}

pub async fn fail(breaker: &CircuitBreaker) -> CallResult<u32> {
    breaker.execute(|| async { Err(TestError::Unavailable) }).await
}

pub async fn succeed(breaker: &CircuitBreaker) -> CallResult<u32> {
    breaker.execute(|| async { Ok(42) }).await
}

/// Collects every event kind the breaker emits while the subscription lives.
pub struct EventLog {
    events: Arc<Mutex<Vec<BreakerEvent>>>,
    _subscription: Subscription,
}

impl EventLog {
    pub fn attach(breaker: &CircuitBreaker) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = breaker.on_event(move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
