//! Circuit breaker subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (agent coordination code):
//!     → circuit_breaker.rs (admission, state machine)
//!     → timeouts.rs (per-call deadline)
//!     → window.rs (rolling outcomes, error rate)
//!     → stats.rs (cumulative counters, transition history)
//!     → events.rs (listeners, broadcast)
//!
//! Collaborators (dashboards, loggers):
//!     → status.rs (BreakerStatus, HealthReport snapshots)
//!     → registry.rs (one breaker per dependency, by name)
//!     → preset.rs (standard / sensitive / resilient / fast)
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global)
//! - Fail fast while Open (no waiting for the operation timeout)
//! - Single trial call in flight while Half-Open
//! - Configuration is fixed at construction

pub mod circuit_breaker;
pub mod error;
pub mod events;
pub mod preset;
pub mod registry;
pub mod state;
pub mod stats;
pub mod status;
pub mod timeouts;
pub mod window;

pub use circuit_breaker::{BreakerBuilder, CircuitBreaker, ErrorFilter};
pub use error::{BreakerError, InvalidStateError};
pub use events::{BreakerEvent, Subscription};
pub use preset::{BreakerFactory, Preset};
pub use registry::BreakerRegistry;
pub use state::CircuitState;
pub use stats::StateChange;
pub use status::{BreakerStatus, HealthReport, MetricsSnapshot, HEALTHY_ERROR_RATE};
