//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, durations > 0)
//! - Detect duplicate breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, BreakerConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("breaker name must not be empty")]
    EmptyName,

    #[error("duplicate breaker name '{0}'")]
    DuplicateName(String),

    #[error("breaker '{breaker}': {field} must be at least 1")]
    ZeroThreshold { breaker: String, field: &'static str },

    #[error("breaker '{breaker}': {field} must be greater than 0")]
    ZeroDuration { breaker: String, field: &'static str },

    #[error("reporter.interval_secs must be greater than 0")]
    ZeroReportInterval,

    #[error("invalid metrics_address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("unknown log_level '{0}'")]
    UnknownLogLevel(String),
}

/// Validate one resolved breaker config, appending problems to `errors`.
pub fn validate_breaker(config: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    let thresholds = [
        ("failure_threshold", config.failure_threshold),
        ("success_threshold", config.success_threshold),
        ("volume_threshold", config.volume_threshold),
    ];
    for (field, value) in thresholds {
        if value == 0 {
            errors.push(ValidationError::ZeroThreshold {
                breaker: config.name.clone(),
                field,
            });
        }
    }

    let durations = [
        ("reset_timeout_ms", config.reset_timeout_ms),
        ("timeout_ms", config.timeout_ms),
        ("window_ms", config.window_ms),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration {
                breaker: config.name.clone(),
                field,
            });
        }
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for spec in &config.breakers {
        if !spec.name.is_empty() && !seen.insert(spec.name.as_str()) {
            errors.push(ValidationError::DuplicateName(spec.name.clone()));
        }
        validate_breaker(&spec.resolve(), &mut errors);
    }

    if config.reporter.interval_secs == 0 {
        errors.push(ValidationError::ZeroReportInterval);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(obs.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BreakerSpec;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [[breakers]]
            name = "store"
            failure_threshold = 0
            window_ms = 0

            [[breakers]]
            name = "store"

            [reporter]
            interval_secs = 0
            "#,
        )
        .unwrap();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroThreshold {
            breaker: "store".into(),
            field: "failure_threshold",
        }));
        assert!(errors.contains(&ValidationError::ZeroDuration {
            breaker: "store".into(),
            field: "window_ms",
        }));
        assert!(errors.contains(&ValidationError::DuplicateName("store".into())));
        assert!(errors.contains(&ValidationError::ZeroReportInterval));
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("not-an-address".into())]
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut config = AppConfig::default();
        config.breakers.push(BreakerSpec {
            name: String::new(),
            preset: Default::default(),
            overrides: Default::default(),
        });
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::EmptyName]
        );
    }
}
