//! Rolling request window.
//!
//! Every admitted call appends an entry stamped with its start time and a
//! unique token. The outcome is filled in when the call finishes; entries
//! still in flight (or whose failure was filtered out) have no outcome and
//! only count toward volume.
//!
//! Entries are appended in start order, so both the timestamps and the
//! tokens are monotonic. Purging pops from the front, lookups binary search
//! on the token.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Recorded outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
struct WindowEntry {
    token: u64,
    started_at: Instant,
    outcome: Option<Outcome>,
}

/// Time-bounded sequence of recent requests.
#[derive(Debug)]
pub struct RequestWindow {
    span: Duration,
    entries: VecDeque<WindowEntry>,
    next_token: u64,
}

impl RequestWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            entries: VecDeque::new(),
            next_token: 0,
        }
    }

    /// Append an in-flight entry and return its token.
    pub fn record_start(&mut self, now: Instant) -> u64 {
        self.purge(now);
        let token = self.next_token;
        self.next_token += 1;
        self.entries.push_back(WindowEntry {
            token,
            started_at: now,
            outcome: None,
        });
        token
    }

    /// Set the outcome of an entry. Returns false if it already aged out.
    pub fn set_outcome(&mut self, token: u64, outcome: Outcome) -> bool {
        match self.entries.binary_search_by_key(&token, |e| e.token) {
            Ok(idx) => {
                self.entries[idx].outcome = Some(outcome);
                true
            }
            Err(_) => false,
        }
    }

    /// Drop entries older than the window span.
    pub fn purge(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.started_at) > self.span {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of entries, in flight or finished.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Some(Outcome::Failure))
            .count()
    }

    /// Failures over entries with a recorded outcome; 0.0 when none finished.
    pub fn error_rate(&self) -> f64 {
        let (resolved, failed) = self.entries.iter().fold((0usize, 0usize), |(r, f), e| {
            match e.outcome {
                Some(Outcome::Failure) => (r + 1, f + 1),
                Some(Outcome::Success) => (r + 1, f),
                None => (r, f),
            }
        });
        if resolved == 0 {
            0.0
        } else {
            failed as f64 / resolved as f64
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_entries_excluded_from_rate() {
        let now = Instant::now();
        let mut window = RequestWindow::new(Duration::from_secs(60));

        let a = window.record_start(now);
        let b = window.record_start(now);
        let _pending = window.record_start(now);

        assert!(window.set_outcome(a, Outcome::Failure));
        assert!(window.set_outcome(b, Outcome::Success));

        assert_eq!(window.len(), 3);
        assert_eq!(window.failures(), 1);
        assert!((window.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_same_instant_entries_are_distinct() {
        let now = Instant::now();
        let mut window = RequestWindow::new(Duration::from_secs(60));

        let first = window.record_start(now);
        let second = window.record_start(now);
        assert_ne!(first, second);

        window.set_outcome(second, Outcome::Failure);
        assert_eq!(window.failures(), 1);
        // the first entry is still in flight, so only one outcome is resolved
        assert!((window.error_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_purge_drops_old_entries() {
        let start = Instant::now();
        let mut window = RequestWindow::new(Duration::from_millis(100));

        let old = window.record_start(start);
        window.set_outcome(old, Outcome::Failure);
        window.record_start(start + Duration::from_millis(80));

        window.purge(start + Duration::from_millis(150));
        assert_eq!(window.len(), 1);
        assert_eq!(window.failures(), 0);
        assert!(!window.set_outcome(old, Outcome::Success));

        // idempotent
        window.purge(start + Duration::from_millis(150));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_empty_window_rate() {
        let window = RequestWindow::new(Duration::from_secs(1));
        assert!(window.is_empty());
        assert_eq!(window.error_rate(), 0.0);
    }
}
