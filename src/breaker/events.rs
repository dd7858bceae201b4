//! Lifecycle events published by a breaker.
//!
//! # Data Flow
//! ```text
//! state machine (under lock)
//!     → collects BreakerEvent values
//!     → lock released
//!     → EventBus::emit
//!         → callback listeners (on_event / on_state_change)
//!         → broadcast channel (subscribe)
//! ```
//!
//! # Design Decisions
//! - Listeners run after the state lock is released, so a listener may call
//!   back into the breaker (e.g. read its status)
//! - The listener list is copy-on-write (`ArcSwap`); emitting never blocks
//!   registration
//! - `Subscription` is an RAII handle: dropping it unregisters the listener

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::breaker::state::CircuitState;

/// Capacity of the broadcast channel; slow receivers observe `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event emitted by a breaker. Serialized with an `event` tag carrying the
/// kebab-case kind (`half-open`, `forced-state-change`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BreakerEvent {
    Success {
        breaker: String,
        state: CircuitState,
    },
    Failure {
        breaker: String,
        state: CircuitState,
        failures: u32,
        error: String,
    },
    Rejected {
        breaker: String,
        state: CircuitState,
    },
    Open {
        breaker: String,
        failures: u32,
    },
    HalfOpen {
        breaker: String,
    },
    Close {
        breaker: String,
    },
    StateChange {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
    },
    ForcedStateChange {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
    },
    Reset {
        breaker: String,
    },
}

impl BreakerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::Success { .. } => "success",
            BreakerEvent::Failure { .. } => "failure",
            BreakerEvent::Rejected { .. } => "rejected",
            BreakerEvent::Open { .. } => "open",
            BreakerEvent::HalfOpen { .. } => "half-open",
            BreakerEvent::Close { .. } => "close",
            BreakerEvent::StateChange { .. } => "state-change",
            BreakerEvent::ForcedStateChange { .. } => "forced-state-change",
            BreakerEvent::Reset { .. } => "reset",
        }
    }

    pub fn breaker(&self) -> &str {
        match self {
            BreakerEvent::Success { breaker, .. }
            | BreakerEvent::Failure { breaker, .. }
            | BreakerEvent::Rejected { breaker, .. }
            | BreakerEvent::Open { breaker, .. }
            | BreakerEvent::HalfOpen { breaker }
            | BreakerEvent::Close { breaker }
            | BreakerEvent::StateChange { breaker, .. }
            | BreakerEvent::ForcedStateChange { breaker, .. }
            | BreakerEvent::Reset { breaker } => breaker,
        }
    }

    /// True for `state-change` and `forced-state-change`.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            BreakerEvent::StateChange { .. } | BreakerEvent::ForcedStateChange { .. }
        )
    }
}

type Listener = Arc<dyn Fn(&BreakerEvent) + Send + Sync>;

/// Fan-out point for a single breaker's events.
pub(crate) struct EventBus {
    listeners: ArcSwap<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<BreakerEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(0),
            tx,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn listen(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push((id, listener.clone()));
            next
        });
        Subscription {
            bus: Arc::downgrade(self),
            id: Some(id),
        }
    }

    fn remove(&self, id: u64) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|(lid, _)| *lid != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    pub(crate) fn emit(&self, event: BreakerEvent) {
        for (_, listener) in self.listeners.load().iter() {
            listener(&event);
        }
        if self.tx.receiver_count() > 0 {
            let _ = self.tx.send(event);
        }
    }
}

/// Handle for a registered listener. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription immediately unregisters its listener"]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: Option<u64>,
}

impl Subscription {
    /// Unregister now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered for the breaker's lifetime.
    pub fn detach(mut self) {
        self.id = None;
    }

    fn release(&mut self) {
        if let (Some(id), Some(bus)) = (self.id.take(), self.bus.upgrade()) {
            bus.remove(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn reset_event() -> BreakerEvent {
        BreakerEvent::Reset {
            breaker: "store".to_string(),
        }
    }

    #[test]
    fn test_listener_receives_until_dropped() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let sub = bus.listen(Arc::new(move |e: &BreakerEvent| {
            sink.lock().unwrap().push(e.kind());
        }));
        bus.emit(reset_event());
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        bus.emit(reset_event());

        assert_eq!(bus.listener_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["reset"]);
    }

    #[test]
    fn test_detach_keeps_listener() {
        let bus = Arc::new(EventBus::new());
        bus.listen(Arc::new(|_: &BreakerEvent| {})).detach();
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_only_removes_own_listener() {
        let bus = Arc::new(EventBus::new());
        let a = bus.listen(Arc::new(|_: &BreakerEvent| {}));
        let _b = bus.listen(Arc::new(|_: &BreakerEvent| {}));
        a.unsubscribe();
        assert_eq!(bus.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(reset_event());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.breaker(), "store");
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = BreakerEvent::ForcedStateChange {
            breaker: "store".into(),
            from: CircuitState::Closed,
            to: CircuitState::HalfOpen,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "forced-state-change");
        assert_eq!(json["to"], "half-open");
        assert!(event.is_state_change());
    }
}
