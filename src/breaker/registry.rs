//! Named breakers shared with collaborators.
//!
//! # Responsibilities
//! - Own one breaker per protected dependency, keyed by name
//! - Build breakers from config specs
//! - Aggregate status and health for dashboards and the health reporter

use dashmap::DashMap;

use crate::breaker::circuit_breaker::CircuitBreaker;
use crate::breaker::preset::{BreakerFactory, Preset};
use crate::breaker::status::{BreakerStatus, HealthReport};
use crate::config::BreakerSpec;

/// Thread-safe registry of breakers.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one breaker per spec.
    pub fn from_specs(specs: &[BreakerSpec]) -> Self {
        let registry = Self::new();
        for spec in specs {
            let breaker = BreakerFactory::from_spec(spec);
            tracing::debug!(
                breaker = %spec.name,
                preset = %spec.preset,
                "Breaker registered"
            );
            if registry.insert(breaker).is_some() {
                tracing::warn!(breaker = %spec.name, "Duplicate breaker name, keeping last definition");
            }
        }
        registry
    }

    /// Register a breaker under its own name, returning any breaker it replaced.
    pub fn insert(&self, breaker: CircuitBreaker) -> Option<CircuitBreaker> {
        self.breakers.insert(breaker.name().to_string(), breaker)
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Fetch a breaker, creating it from `preset` on first use.
    pub fn get_or_create(&self, name: &str, preset: Preset) -> CircuitBreaker {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| BreakerFactory::create(preset, name))
            .value()
            .clone()
    }

    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    /// Breaker names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All breakers, sorted by name.
    pub fn breakers(&self) -> Vec<CircuitBreaker> {
        let mut all: Vec<CircuitBreaker> = self.breakers.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn statuses(&self) -> Vec<BreakerStatus> {
        self.breakers().iter().map(CircuitBreaker::status).collect()
    }

    pub fn health(&self) -> Vec<HealthReport> {
        self.breakers().iter().map(CircuitBreaker::health).collect()
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers() {
            breaker.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
