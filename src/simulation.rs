//! Randomized workload driver.
//!
//! Fires batches of concurrent calls at a breaker with configurable
//! failure, validation-error and slow-call rates, then reports what callers
//! observed alongside the breaker's final status.

use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::breaker::{BreakerBuilder, BreakerError, BreakerStatus, CircuitBreaker};
use crate::config::BreakerConfig;
use crate::lifecycle::Shutdown;

const LIVE: &str = "live";
const FALLBACK: &str = "fallback";

/// Errors produced by the simulated dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimulatedError {
    #[error("simulated dependency failure")]
    Dependency,
    #[error("simulated validation error")]
    Validation,
}

/// Error filter that ignores validation errors, as business errors should not trip a breaker.
pub fn counts_toward_breaker(err: &(dyn std::error::Error + 'static)) -> bool {
    !matches!(
        err.downcast_ref::<SimulatedError>(),
        Some(SimulatedError::Validation)
    )
}

/// Build a breaker for simulation: `config` plus the validation-ignoring filter.
pub fn simulation_breaker(config: BreakerConfig) -> CircuitBreaker {
    BreakerBuilder::from_config(config)
        .error_filter(counts_toward_breaker)
        .build()
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationPlan {
    pub calls: u32,
    pub concurrency: usize,
    /// Fraction of calls failing with a dependency error.
    pub failure_rate: f64,
    /// Fraction of calls failing with a validation error.
    pub invalid_rate: f64,
    /// Fraction of calls that outlast the breaker's timeout.
    pub slow_rate: f64,
    /// Latency of normal calls.
    pub latency_ms: u64,
    /// Pause between batches.
    pub pause_ms: u64,
    pub use_fallback: bool,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            calls: 100,
            concurrency: 4,
            failure_rate: 0.5,
            invalid_rate: 0.0,
            slow_rate: 0.0,
            latency_ms: 20,
            pause_ms: 50,
            use_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Planned {
    Succeed,
    Fail,
    Invalid,
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observed {
    Succeeded,
    Failed,
    Ignored,
    TimedOut,
    Rejected,
    Fallback,
}

/// What callers saw, plus the breaker's final status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub calls: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub ignored: u32,
    pub timed_out: u32,
    pub rejected: u32,
    pub fallbacks: u32,
    pub status: Option<BreakerStatus>,
}

impl SimulationReport {
    fn tally(&mut self, observed: Observed) {
        self.calls += 1;
        match observed {
            Observed::Succeeded => self.succeeded += 1,
            Observed::Failed => self.failed += 1,
            Observed::Ignored => self.ignored += 1,
            Observed::TimedOut => self.timed_out += 1,
            Observed::Rejected => self.rejected += 1,
            Observed::Fallback => self.fallbacks += 1,
        }
    }
}

fn plan_batch(plan: &SimulationPlan, size: usize) -> Vec<Planned> {
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| {
            let roll: f64 = rng.gen();
            if roll < plan.slow_rate {
                Planned::Hang
            } else if roll < plan.slow_rate + plan.invalid_rate {
                Planned::Invalid
            } else if roll < plan.slow_rate + plan.invalid_rate + plan.failure_rate {
                Planned::Fail
            } else {
                Planned::Succeed
            }
        })
        .collect()
}

async fn run_one(breaker: &CircuitBreaker, planned: Planned, plan: &SimulationPlan) -> Observed {
    let latency = Duration::from_millis(plan.latency_ms);
    let hang = breaker.config().timeout().saturating_mul(2);

    let operation = || async move {
        match planned {
            Planned::Succeed => {
                tokio::time::sleep(latency).await;
                Ok(LIVE)
            }
            Planned::Fail => {
                tokio::time::sleep(latency).await;
                Err(SimulatedError::Dependency)
            }
            Planned::Invalid => Err(SimulatedError::Validation),
            Planned::Hang => {
                tokio::time::sleep(hang).await;
                Ok(LIVE)
            }
        }
    };

    let result = if plan.use_fallback {
        breaker
            .execute_with_fallback(operation, || async { Ok(FALLBACK) })
            .await
    } else {
        breaker.execute(operation).await
    };

    match result {
        Ok(FALLBACK) => Observed::Fallback,
        Ok(_) => Observed::Succeeded,
        Err(BreakerError::CircuitOpen { .. }) => Observed::Rejected,
        Err(BreakerError::Timeout { .. }) => Observed::TimedOut,
        Err(BreakerError::Operation(SimulatedError::Validation)) => Observed::Ignored,
        Err(BreakerError::Operation(SimulatedError::Dependency)) => Observed::Failed,
    }
}

/// Run `plan` against `breaker`, stopping early if `shutdown` fires.
pub async fn run_simulation(
    breaker: &CircuitBreaker,
    plan: &SimulationPlan,
    shutdown: Option<&Shutdown>,
) -> SimulationReport {
    let mut report = SimulationReport::default();
    let concurrency = plan.concurrency.max(1);
    let mut remaining = plan.calls as usize;

    tracing::info!(
        breaker = %breaker.name(),
        calls = plan.calls,
        concurrency,
        "Simulation starting"
    );

    while remaining > 0 {
        if shutdown.is_some_and(Shutdown::is_triggered) {
            tracing::info!(breaker = %breaker.name(), "Simulation interrupted");
            break;
        }

        let size = remaining.min(concurrency);
        let batch = plan_batch(plan, size);
        let observed = join_all(batch.into_iter().map(|p| run_one(breaker, p, plan))).await;
        for o in observed {
            report.tally(o);
        }
        remaining -= size;

        if remaining > 0 && plan.pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(plan.pause_ms)).await;
        }
    }

    report.status = Some(breaker.status());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;

    fn config() -> BreakerConfig {
        BreakerConfig {
            name: "sim".into(),
            failure_threshold: 3,
            volume_threshold: 5,
            timeout_ms: 100,
            reset_timeout_ms: 60_000,
            ..BreakerConfig::default()
        }
    }

    #[test]
    fn test_filter_ignores_validation_only() {
        assert!(!counts_toward_breaker(&SimulatedError::Validation));
        assert!(counts_toward_breaker(&SimulatedError::Dependency));
        assert!(counts_toward_breaker(&std::fmt::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_dependency_trips_breaker() {
        let breaker = simulation_breaker(config());
        let plan = SimulationPlan {
            calls: 20,
            concurrency: 1,
            failure_rate: 1.0,
            ..SimulationPlan::default()
        };

        let report = run_simulation(&breaker, &plan, None).await;
        assert_eq!(report.calls, 20);
        assert_eq!(report.failed, 5);
        assert_eq!(report.rejected, 15);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(report.status.unwrap().metrics.rejected_requests, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_serves_rejected_calls() {
        let breaker = simulation_breaker(config());
        let plan = SimulationPlan {
            calls: 10,
            concurrency: 1,
            failure_rate: 1.0,
            use_fallback: true,
            ..SimulationPlan::default()
        };

        let report = run_simulation(&breaker, &plan, None).await;
        // the fifth failure opens the breaker and is itself served by the fallback
        assert_eq!(report.failed, 4);
        assert_eq!(report.fallbacks, 6);
        assert_eq!(report.rejected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_never_trip() {
        let breaker = simulation_breaker(config());
        let plan = SimulationPlan {
            calls: 30,
            concurrency: 3,
            failure_rate: 0.0,
            invalid_rate: 1.0,
            ..SimulationPlan::default()
        };

        let report = run_simulation(&breaker, &plan, None).await;
        assert_eq!(report.ignored, 30);
        let status = report.status.unwrap();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failures, 0);
        assert_eq!(status.metrics.ignored_errors, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_time_out() {
        let breaker = simulation_breaker(BreakerConfig {
            volume_threshold: 100,
            ..config()
        });
        let plan = SimulationPlan {
            calls: 4,
            concurrency: 2,
            failure_rate: 0.0,
            slow_rate: 1.0,
            ..SimulationPlan::default()
        };

        let report = run_simulation(&breaker, &plan, None).await;
        assert_eq!(report.timed_out, 4);
        assert_eq!(report.status.unwrap().metrics.timeouts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_shutdown_triggered() {
        let breaker = simulation_breaker(config());
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let report = run_simulation(&breaker, &SimulationPlan::default(), Some(&shutdown)).await;
        assert_eq!(report.calls, 0);
        assert!(report.status.is_some());
    }
}
