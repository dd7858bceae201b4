//! Named breaker presets and the factory that applies them.
//!
//! | preset    | failure_threshold | reset_timeout_ms | success_threshold | timeout_ms |
//! |-----------|-------------------|------------------|-------------------|------------|
//! | standard  | 5                 | 60000            | 2                 | 10000      |
//! | sensitive | 3                 | 30000            | 1                 | 5000       |
//! | resilient | 10                | 120000           | 5                 | 30000      |
//! | fast      | 3                 | 10000            | 1                 | 3000       |
//!
//! Fields not listed keep the standard defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::breaker::circuit_breaker::{BreakerBuilder, CircuitBreaker};
use crate::config::{BreakerConfig, BreakerOverrides, BreakerSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Standard,
    Sensitive,
    Resilient,
    Fast,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown preset '{0}' (expected standard, sensitive, resilient or fast)")]
pub struct UnknownPreset(pub String);

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Standard,
        Preset::Sensitive,
        Preset::Resilient,
        Preset::Fast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Standard => "standard",
            Preset::Sensitive => "sensitive",
            Preset::Resilient => "resilient",
            Preset::Fast => "fast",
        }
    }

    /// Base configuration for this preset.
    pub fn config(&self) -> BreakerConfig {
        let base = BreakerConfig::default();
        match self {
            Preset::Standard => base,
            Preset::Sensitive => BreakerConfig {
                failure_threshold: 3,
                reset_timeout_ms: 30_000,
                success_threshold: 1,
                timeout_ms: 5_000,
                ..base
            },
            Preset::Resilient => BreakerConfig {
                failure_threshold: 10,
                reset_timeout_ms: 120_000,
                success_threshold: 5,
                timeout_ms: 30_000,
                ..base
            },
            Preset::Fast => BreakerConfig {
                failure_threshold: 3,
                reset_timeout_ms: 10_000,
                success_threshold: 1,
                timeout_ms: 3_000,
                ..base
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// Produces preconfigured breakers.
pub struct BreakerFactory;

impl BreakerFactory {
    /// Builder seeded with a preset and a name; chain setters to customize.
    pub fn builder(preset: Preset, name: impl Into<String>) -> BreakerBuilder {
        let mut config = preset.config();
        config.name = name.into();
        BreakerBuilder::from_config(config)
    }

    pub fn create(preset: Preset, name: impl Into<String>) -> CircuitBreaker {
        Self::builder(preset, name).build()
    }

    /// Preset with custom fields overriding preset values.
    pub fn create_with(
        preset: Preset,
        name: impl Into<String>,
        overrides: &BreakerOverrides,
    ) -> CircuitBreaker {
        let mut config = preset.config();
        overrides.apply(&mut config);
        config.name = name.into();
        BreakerBuilder::from_config(config).build()
    }

    pub fn from_spec(spec: &BreakerSpec) -> CircuitBreaker {
        BreakerBuilder::from_config(spec.resolve()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_table() {
        let sensitive = Preset::Sensitive.config();
        assert_eq!(
            (
                sensitive.failure_threshold,
                sensitive.reset_timeout_ms,
                sensitive.success_threshold,
                sensitive.timeout_ms
            ),
            (3, 30_000, 1, 5_000)
        );
        let resilient = Preset::Resilient.config();
        assert_eq!(resilient.failure_threshold, 10);
        assert_eq!(resilient.success_threshold, 5);
        let fast = Preset::Fast.config();
        assert_eq!(fast.reset_timeout_ms, 10_000);
        assert_eq!(fast.timeout_ms, 3_000);
        // untouched fields keep standard values
        assert_eq!(fast.volume_threshold, 10);
        assert_eq!(fast.window_ms, 60_000);
        assert_eq!(Preset::Standard.config(), BreakerConfig::default());
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!("Fast".parse::<Preset>().unwrap(), Preset::Fast);
        assert!("turbo".parse::<Preset>().is_err());
    }

    #[test]
    fn test_overrides_win() {
        let overrides = BreakerOverrides {
            timeout_ms: Some(250),
            ..Default::default()
        };
        let breaker = BreakerFactory::create_with(Preset::Sensitive, "store", &overrides);
        let config = breaker.config();
        assert_eq!(config.name, "store");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.failure_threshold, 3);
    }
}
