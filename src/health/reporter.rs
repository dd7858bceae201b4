//! Periodic breaker health reporting.
//!
//! # Responsibilities
//! - Periodically read every registered breaker's health
//! - Log unhealthy breakers and export the health gauge

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::breaker::{BreakerRegistry, HealthReport};
use crate::config::ReporterConfig;
use crate::observability::metrics;

pub struct HealthReporter {
    registry: Arc<BreakerRegistry>,
    config: ReporterConfig,
}

impl HealthReporter {
    pub fn new(registry: Arc<BreakerRegistry>, config: ReporterConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health reporter disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            breakers = self.registry.len(),
            "Health reporter starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Log and export one round of health reports; returns them for callers.
    pub fn report(&self) -> Vec<HealthReport> {
        let reports = self.registry.health();
        for report in &reports {
            metrics::record_health(&report.name, report.healthy);
            if report.healthy {
                tracing::debug!(
                    breaker = %report.name,
                    error_rate = report.error_rate,
                    "Breaker healthy"
                );
            } else {
                tracing::warn!(
                    breaker = %report.name,
                    state = %report.state,
                    error_rate = report.error_rate,
                    recent_failures = report.recent_failures,
                    "Breaker unhealthy"
                );
            }
        }
        reports
    }
}
