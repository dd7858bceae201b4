//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer
//!     → reporter.rs reads BreakerRegistry::health()
//!     → warn log for unhealthy breakers
//!     → circuit_breaker_healthy gauge
//! ```
//!
//! # Design Decisions
//! - Healthy means Closed with a windowed error rate below 10%
//! - Reporting only reads; it never changes breaker state

pub mod reporter;

pub use reporter::HealthReporter;
