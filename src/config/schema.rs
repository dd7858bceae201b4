//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker
//! service. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::preset::Preset;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Periodic health reporter settings.
    pub reporter: ReporterConfig,

    /// Named breakers to create at startup.
    pub breakers: Vec<BreakerSpec>,
}

/// Fixed configuration of a single breaker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Identifier used in logs, metrics and status reports.
    pub name: String,

    /// Counted failures (while closed) that make the breaker eligible to open.
    pub failure_threshold: u32,

    /// How long the breaker stays open before a trial call, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Minimum requests in the window before the breaker may open.
    pub volume_threshold: u32,

    /// Rolling window span in milliseconds.
    pub window_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "CircuitBreaker".to_string(),
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            success_threshold: 2,
            timeout_ms: 10_000,
            volume_threshold: 10,
            window_ms: 60_000,
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Optional per-field overrides applied on top of a preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

impl BreakerOverrides {
    /// Overwrite every field that is set.
    pub fn apply(&self, config: &mut BreakerConfig) {
        if let Some(v) = self.failure_threshold {
            config.failure_threshold = v;
        }
        if let Some(v) = self.reset_timeout_ms {
            config.reset_timeout_ms = v;
        }
        if let Some(v) = self.success_threshold {
            config.success_threshold = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.volume_threshold {
            config.volume_threshold = v;
        }
        if let Some(v) = self.window_ms {
            config.window_ms = v;
        }
    }
}

/// A named breaker entry in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerSpec {
    /// Breaker name (must be unique).
    pub name: String,

    /// Preset providing the base values.
    #[serde(default)]
    pub preset: Preset,

    /// Fields overriding the preset.
    #[serde(flatten)]
    pub overrides: BreakerOverrides,
}

impl BreakerSpec {
    /// Resolve preset + overrides into a concrete config.
    pub fn resolve(&self) -> BreakerConfig {
        let mut config = self.preset.config();
        self.overrides.apply(&mut config);
        config.name = self.name.clone();
        config
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for log aggregation.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Health reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Enable periodic health reports.
    pub enabled: bool,

    /// Report interval in seconds.
    pub interval_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_standard_breaker() {
        let config = BreakerConfig::default();
        assert_eq!(config.name, "CircuitBreaker");
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout(), Duration::from_secs(60));
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.volume_threshold, 10);
        assert_eq!(config.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_spec_resolves_preset_then_overrides() {
        let config: AppConfig = toml::from_str(
            r#"
            [[breakers]]
            name = "decision-store"
            preset = "fast"
            timeout_ms = 1500

            [[breakers]]
            name = "agent-bus"
            "#,
        )
        .unwrap();

        let store = config.breakers[0].resolve();
        assert_eq!(store.name, "decision-store");
        assert_eq!(store.failure_threshold, 3);
        assert_eq!(store.reset_timeout_ms, 10_000);
        assert_eq!(store.timeout_ms, 1500);

        let bus = config.breakers[1].resolve();
        assert_eq!(bus.name, "agent-bus");
        assert_eq!(bus.failure_threshold, 5);
        assert_eq!(bus.timeout_ms, 10_000);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.breakers.is_empty());
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.reporter.enabled);
    }
}
