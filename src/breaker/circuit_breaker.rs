//! Circuit breaker protecting calls to a single dependency.
//!
//! # Call Flow
//! ```text
//! execute(operation, fallback?)
//!     → admit: total_requests += 1
//!         Open + reset timeout elapsed  → Half-Open, this call is the trial
//!         Open (or Half-Open trial busy) → rejected: fallback or CircuitOpen
//!     → window entry (token, start, outcome unset)
//!     → operation raced against the per-call timeout
//!     → success: outcome success, success path of the state machine
//!     → failure: error filter (timeouts always count)
//!         counted  → outcome failure, failure path of the state machine
//!         excluded → window entry left unset, error still propagated
//!     → breaker Open after the failure + fallback given → fallback result
//! ```
//!
//! # Design Decisions
//! - One mutex guards state, counters, window and stats; it is never held
//!   across an await point
//! - Events are collected under the lock and emitted after it is released
//! - The reset timer moves Open → Half-Open proactively; the elapsed-time
//!   check on admission is authoritative and works without the timer
//! - At most one trial call is in flight while Half-Open; an abandoned trial
//!   (caller dropped the future) frees its slot when its ticket drops

use std::fmt;
use std::future::{Future, Ready};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::breaker::error::{BreakerError, InvalidStateError};
use crate::breaker::events::{BreakerEvent, EventBus, Subscription};
use crate::breaker::state::CircuitState;
use crate::breaker::stats::{epoch_millis, BreakerStats};
use crate::breaker::status::{BreakerStatus, HealthReport, MetricsSnapshot};
use crate::breaker::timeouts;
use crate::breaker::window::{Outcome, RequestWindow};
use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Windowed error rate that must be exceeded (with the failure threshold) to open.
const OPEN_ERROR_RATE: f64 = 0.5;

/// Trial calls allowed in flight while half-open.
const HALF_OPEN_TRIALS: u32 = 1;

/// Decides whether an operation error counts toward breaker statistics.
pub type ErrorFilter = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Builder for [`CircuitBreaker`].
pub struct BreakerBuilder {
    config: BreakerConfig,
    error_filter: Option<ErrorFilter>,
}

impl BreakerBuilder {
    /// Start from the standard defaults with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(BreakerConfig {
            name: name.into(),
            ..BreakerConfig::default()
        })
    }

    pub fn from_config(config: BreakerConfig) -> Self {
        Self {
            config,
            error_filter: None,
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn volume_threshold(mut self, threshold: u32) -> Self {
        self.config.volume_threshold = threshold;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window_ms = window.as_millis() as u64;
        self
    }

    /// Errors for which `filter` returns false are propagated but not counted.
    /// Timeouts are always counted.
    pub fn error_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.error_filter = Some(Arc::new(filter));
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let window = RequestWindow::new(self.config.window());
        let shared = Shared {
            error_filter: self.error_filter.unwrap_or_else(|| Arc::new(|_| true)),
            core: Mutex::new(Core {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                trials_in_flight: 0,
                trial_epoch: 0,
                last_failure: None,
                last_failure_ms: None,
                window,
                stats: BreakerStats::default(),
                reset_timer: None,
                timer_seq: 0,
            }),
            events: Arc::new(EventBus::new()),
            config: self.config,
        };
        metrics::record_state(&shared.config.name, CircuitState::Closed);
        CircuitBreaker {
            shared: Arc::new(shared),
        }
    }
}

/// A circuit breaker. Cloning yields another handle to the same breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    config: BreakerConfig,
    error_filter: ErrorFilter,
    core: Mutex<Core>,
    events: Arc<EventBus>,
}

struct Core {
    state: CircuitState,
    failures: u32,
    successes: u32,
    trials_in_flight: u32,
    /// Bumped whenever a new half-open period starts, so stale trials
    /// cannot release a slot of a later period.
    trial_epoch: u64,
    last_failure: Option<Instant>,
    last_failure_ms: Option<u64>,
    window: RequestWindow,
    stats: BreakerStats,
    reset_timer: Option<ResetTimer>,
    timer_seq: u64,
}

/// Armed Open → Half-Open timer. The id lets a task that already woke
/// recognize that it was superseded.
struct ResetTimer {
    id: u64,
    handle: AbortHandle,
}

/// Admission for one executing call.
///
/// `trial_epoch` is taken when an outcome path releases the trial slot; a
/// ticket dropped while still holding it gives the slot back.
struct Ticket {
    shared: Weak<Shared>,
    token: u64,
    trial_epoch: Option<u64>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.trial_epoch.is_none() {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            tracing::debug!(breaker = %shared.config.name, "Half-open trial abandoned, releasing slot");
            let mut core = shared.lock();
            Shared::release_trial(&mut core, self);
        }
    }
}

enum Admission {
    Run(Ticket),
    Reject,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        BreakerBuilder::from_config(config).build()
    }

    pub fn builder(name: impl Into<String>) -> BreakerBuilder {
        BreakerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.shared.config
    }

    pub fn state(&self) -> CircuitState {
        self.shared.lock().state
    }

    /// Run `operation` through the breaker.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.call(operation, None::<fn() -> Ready<Result<T, E>>>)
            .await
    }

    /// Run `operation` through the breaker, using `fallback` when the call is
    /// rejected or when it fails and leaves the breaker open.
    pub async fn execute_with_fallback<F, Fut, G, GFut, T, E>(
        &self,
        operation: F,
        fallback: G,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.call(operation, Some(fallback)).await
    }

    async fn call<F, Fut, G, GFut, T, E>(
        &self,
        operation: F,
        fallback: Option<G>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let ticket = match self.shared.admit() {
            Admission::Run(ticket) => ticket,
            Admission::Reject => {
                return match fallback {
                    Some(fallback) => fallback().await.map_err(BreakerError::Operation),
                    None => Err(BreakerError::CircuitOpen {
                        name: self.name().to_string(),
                    }),
                };
            }
        };

        let (error, state) = match timeouts::guarded(self.shared.config.timeout(), operation()).await
        {
            Ok(Ok(value)) => {
                self.shared.on_success(ticket);
                return Ok(value);
            }
            Ok(Err(err)) => {
                let as_dyn: &(dyn std::error::Error + 'static) = &err;
                let counted = (self.shared.error_filter)(as_dyn);
                let state = self
                    .shared
                    .on_failure(ticket, counted, false, err.to_string());
                (BreakerError::Operation(err), state)
            }
            Err(timed_out) => {
                let err = BreakerError::Timeout {
                    timeout_ms: timed_out.limit_ms(),
                };
                let state = self.shared.on_failure(ticket, true, true, err.to_string());
                (err, state)
            }
        };

        match (state, fallback) {
            (CircuitState::Open, Some(fallback)) => {
                tracing::debug!(breaker = %self.name(), error = %error, "Serving fallback after failure");
                fallback().await.map_err(BreakerError::Operation)
            }
            _ => Err(error),
        }
    }

    /// Snapshot of state, counters, metrics and configuration.
    pub fn status(&self) -> BreakerStatus {
        let mut core = self.shared.lock();
        core.window.purge(Instant::now());
        BreakerStatus {
            name: self.shared.config.name.clone(),
            state: core.state,
            failures: core.failures,
            successes: core.successes,
            last_failure_ms: core.last_failure_ms,
            metrics: MetricsSnapshot {
                total_requests: core.stats.total_requests,
                successful_requests: core.stats.successful_requests,
                failed_requests: core.stats.failed_requests,
                rejected_requests: core.stats.rejected_requests,
                timeouts: core.stats.timeouts,
                ignored_errors: core.stats.ignored_errors,
                state_changes: core.stats.state_changes.iter().cloned().collect(),
                error_rate: core.window.error_rate(),
                window_size: core.window.len(),
            },
            config: self.shared.config.clone(),
        }
    }

    /// Healthy iff closed and the windowed error rate is below 10%.
    pub fn health(&self) -> HealthReport {
        let now = Instant::now();
        let mut core = self.shared.lock();
        core.window.purge(now);
        let error_rate = core.window.error_rate();
        HealthReport {
            name: self.shared.config.name.clone(),
            healthy: HealthReport::is_healthy(core.state, error_rate),
            state: core.state,
            error_rate,
            recent_failures: core.window.failures(),
            uptime_ms: core
                .stats
                .first_change()
                .map(|first| now.saturating_duration_since(first).as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// Back to Closed with zeroed counters, an empty window and no history.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Administrative override, bypassing the normal transition rules.
    pub fn force_state(&self, state: CircuitState) {
        self.shared.force(state);
    }

    /// String form of [`force_state`](Self::force_state).
    pub fn force_state_named(&self, state: &str) -> Result<CircuitState, InvalidStateError> {
        let state: CircuitState = state.parse()?;
        self.force_state(state);
        Ok(state)
    }

    /// Register a listener for every event.
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BreakerEvent) + Send + Sync + 'static,
    {
        self.shared.events.listen(Arc::new(listener))
    }

    /// Register a listener for `state-change` and `forced-state-change` only.
    pub fn on_state_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BreakerEvent) + Send + Sync + 'static,
    {
        self.shared.events.listen(Arc::new(move |event: &BreakerEvent| {
            if event.is_state_change() {
                listener(event);
            }
        }))
    }

    /// Receive events over a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.shared.events.subscribe()
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, then emit whatever events it produced.
    fn apply<R>(&self, f: impl FnOnce(&mut Core, &mut Vec<BreakerEvent>) -> R) -> R {
        let mut events = Vec::new();
        let out = {
            let mut core = self.lock();
            f(&mut core, &mut events)
        };
        for event in events {
            self.events.emit(event);
        }
        out
    }

    fn name(&self) -> String {
        self.config.name.clone()
    }

    fn reset_elapsed(&self, core: &Core, now: Instant) -> bool {
        match core.last_failure {
            Some(at) => now.saturating_duration_since(at) >= self.config.reset_timeout(),
            None => true,
        }
    }

    fn admit(self: &Arc<Self>) -> Admission {
        self.apply(|core, events| {
            let now = Instant::now();
            core.stats.total_requests += 1;

            if core.state == CircuitState::Open && self.reset_elapsed(core, now) {
                self.half_open(core, events);
            }

            let trial_epoch = match core.state {
                CircuitState::Closed => None,
                CircuitState::HalfOpen if core.trials_in_flight < HALF_OPEN_TRIALS => {
                    core.trials_in_flight += 1;
                    Some(core.trial_epoch)
                }
                state => {
                    core.stats.rejected_requests += 1;
                    metrics::record_request(&self.config.name, "rejected");
                    tracing::debug!(breaker = %self.config.name, state = %state, "Call rejected");
                    events.push(BreakerEvent::Rejected {
                        breaker: self.name(),
                        state,
                    });
                    return Admission::Reject;
                }
            };

            let token = core.window.record_start(now);
            Admission::Run(Ticket {
                shared: Arc::downgrade(self),
                token,
                trial_epoch,
            })
        })
    }

    fn release_trial(core: &mut Core, ticket: &mut Ticket) {
        if let Some(epoch) = ticket.trial_epoch.take() {
            if core.state == CircuitState::HalfOpen && core.trial_epoch == epoch {
                core.trials_in_flight = core.trials_in_flight.saturating_sub(1);
            }
        }
    }

    fn on_success(self: &Arc<Self>, mut ticket: Ticket) {
        self.apply(|core, events| {
            Self::release_trial(core, &mut ticket);
            core.stats.successful_requests += 1;
            core.window.set_outcome(ticket.token, Outcome::Success);
            metrics::record_request(&self.config.name, "success");

            events.push(BreakerEvent::Success {
                breaker: self.name(),
                state: core.state,
            });

            match core.state {
                CircuitState::Closed => core.failures = 0,
                CircuitState::HalfOpen => {
                    core.successes += 1;
                    if core.successes >= self.config.success_threshold {
                        self.close(core, events);
                    }
                }
                // late result of a call admitted before the breaker opened
                CircuitState::Open => {}
            }
        })
    }

    /// Record a failed call; returns the state after the failure path ran.
    fn on_failure(
        self: &Arc<Self>,
        mut ticket: Ticket,
        counted: bool,
        timed_out: bool,
        error: String,
    ) -> CircuitState {
        self.apply(|core, events| {
            Self::release_trial(core, &mut ticket);
            if timed_out {
                core.stats.timeouts += 1;
            }

            if !counted {
                core.stats.ignored_errors += 1;
                metrics::record_request(&self.config.name, "ignored");
                tracing::debug!(breaker = %self.config.name, error = %error, "Failure excluded by error filter");
                return core.state;
            }

            let now = Instant::now();
            core.stats.failed_requests += 1;
            core.window.set_outcome(ticket.token, Outcome::Failure);
            core.failures += 1;
            core.last_failure = Some(now);
            core.last_failure_ms = Some(epoch_millis());
            metrics::record_request(
                &self.config.name,
                if timed_out { "timeout" } else { "failure" },
            );

            events.push(BreakerEvent::Failure {
                breaker: self.name(),
                state: core.state,
                failures: core.failures,
                error,
            });

            match core.state {
                CircuitState::HalfOpen => self.open(core, events),
                CircuitState::Closed => {
                    if self.should_open(core, now) {
                        self.open(core, events);
                    }
                }
                CircuitState::Open => {}
            }
            core.state
        })
    }

    fn should_open(&self, core: &mut Core, now: Instant) -> bool {
        core.window.purge(now);
        if core.window.len() < self.config.volume_threshold as usize {
            return false;
        }
        core.failures >= self.config.failure_threshold
            && core.window.error_rate() > OPEN_ERROR_RATE
    }

    fn open(self: &Arc<Self>, core: &mut Core, events: &mut Vec<BreakerEvent>) {
        if core.state == CircuitState::Open {
            return;
        }
        let from = core.state;
        core.state = CircuitState::Open;
        core.successes = 0;
        core.trials_in_flight = 0;
        self.arm_reset_timer(core, self.config.reset_timeout());

        tracing::warn!(
            breaker = %self.config.name,
            from = %from,
            failures = core.failures,
            error_rate = core.window.error_rate(),
            "Circuit breaker opened"
        );
        events.push(BreakerEvent::Open {
            breaker: self.name(),
            failures: core.failures,
        });
        self.note_transition(core, from, CircuitState::Open, events);
    }

    fn half_open(&self, core: &mut Core, events: &mut Vec<BreakerEvent>) {
        if core.state == CircuitState::HalfOpen {
            return;
        }
        let from = core.state;
        core.state = CircuitState::HalfOpen;
        core.failures = 0;
        core.successes = 0;
        core.trials_in_flight = 0;
        core.trial_epoch += 1;
        Self::cancel_reset_timer(core);

        tracing::info!(breaker = %self.config.name, "Circuit breaker half-open, allowing trial call");
        events.push(BreakerEvent::HalfOpen {
            breaker: self.name(),
        });
        self.note_transition(core, from, CircuitState::HalfOpen, events);
    }

    fn close(&self, core: &mut Core, events: &mut Vec<BreakerEvent>) {
        if core.state == CircuitState::Closed {
            return;
        }
        let from = core.state;
        core.state = CircuitState::Closed;
        core.failures = 0;
        core.successes = 0;
        core.trials_in_flight = 0;
        Self::cancel_reset_timer(core);

        tracing::info!(breaker = %self.config.name, "Circuit breaker closed, dependency recovered");
        events.push(BreakerEvent::Close {
            breaker: self.name(),
        });
        self.note_transition(core, from, CircuitState::Closed, events);
    }

    fn note_transition(
        &self,
        core: &mut Core,
        from: CircuitState,
        to: CircuitState,
        events: &mut Vec<BreakerEvent>,
    ) {
        core.stats.record_change(from, to, Instant::now());
        metrics::record_transition(&self.config.name, from, to);
        events.push(BreakerEvent::StateChange {
            breaker: self.name(),
            from,
            to,
        });
    }

    fn arm_reset_timer(self: &Arc<Self>, core: &mut Core, delay: Duration) {
        Self::cancel_reset_timer(core);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(breaker = %self.config.name, "No runtime for reset timer, relying on lazy check");
            return;
        };
        core.timer_seq += 1;
        let id = core.timer_seq;
        let breaker = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = breaker.upgrade() {
                shared.on_reset_timer(id);
            }
        });
        core.reset_timer = Some(ResetTimer {
            id,
            handle: task.abort_handle(),
        });
    }

    fn cancel_reset_timer(core: &mut Core) {
        if let Some(timer) = core.reset_timer.take() {
            timer.handle.abort();
        }
    }

    fn on_reset_timer(self: &Arc<Self>, id: u64) {
        self.apply(|core, events| {
            if core.reset_timer.as_ref().map(|timer| timer.id) != Some(id) {
                // cancelled or re-armed after this task woke
                return;
            }
            core.reset_timer = None;
            if core.state != CircuitState::Open {
                return;
            }
            let now = Instant::now();
            if self.reset_elapsed(core, now) {
                self.half_open(core, events);
            } else if let Some(at) = core.last_failure {
                // a late failure pushed the deadline back
                let remaining = (at + self.config.reset_timeout()).saturating_duration_since(now);
                self.arm_reset_timer(core, remaining);
            }
        });
    }

    fn reset(&self) {
        self.apply(|core, events| {
            Self::cancel_reset_timer(core);
            core.state = CircuitState::Closed;
            core.failures = 0;
            core.successes = 0;
            core.trials_in_flight = 0;
            core.trial_epoch += 1;
            core.last_failure = None;
            core.last_failure_ms = None;
            core.window.clear();
            core.stats = BreakerStats::default();
            metrics::record_state(&self.config.name, CircuitState::Closed);

            tracing::info!(breaker = %self.config.name, "Circuit breaker reset");
            events.push(BreakerEvent::Reset {
                breaker: self.name(),
            });
        });
    }

    fn force(self: &Arc<Self>, to: CircuitState) {
        self.apply(|core, events| {
            let from = core.state;
            Self::cancel_reset_timer(core);
            core.state = to;
            core.failures = 0;
            core.successes = 0;
            core.trials_in_flight = 0;
            core.trial_epoch += 1;
            if to == CircuitState::Open {
                core.last_failure = Some(Instant::now());
                core.last_failure_ms = Some(epoch_millis());
                self.arm_reset_timer(core, self.config.reset_timeout());
            }
            core.stats.record_change(from, to, Instant::now());
            metrics::record_transition(&self.config.name, from, to);

            tracing::warn!(breaker = %self.config.name, from = %from, to = %to, "Circuit breaker state forced");
            events.push(BreakerEvent::ForcedStateChange {
                breaker: self.name(),
                from,
                to,
            });
        });
    }
}
