//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → BreakerSpec::resolve (preset + overrides)
//!     → BreakerConfig fixed at breaker construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers never change config in flight
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AppConfig;
pub use schema::BreakerConfig;
pub use schema::BreakerOverrides;
pub use schema::BreakerSpec;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ReporterConfig;
