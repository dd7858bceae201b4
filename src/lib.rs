//! Circuit breakers for agent coordination calls.

pub mod breaker;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod simulation;

pub use breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use config::AppConfig;
pub use lifecycle::Shutdown;
