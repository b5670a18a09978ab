use std::time::Duration;
use tokio::time::Instant;

/// Tracks the throttling state of one host
///
/// The rate limiter keeps one of these per host behind an async mutex; the
/// mutex queue serializes waiters and this struct records when the next
/// request may fire.
#[derive(Debug, Clone, Default)]
pub struct HostRateState {
    /// Earliest instant the next request to this host may start
    pub next_allowed: Option<Instant>,

    /// Number of requests released for this host in the current session
    pub request_count: u32,
}

impl HostRateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates how long a request starting at `now` must wait
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        match self.next_allowed {
            Some(next) if next > now => Some(next - now),
            _ => None,
        }
    }

    /// Records that a request was released at `now`
    pub fn record_request(&mut self, now: Instant, min_interval: Duration) {
        self.request_count += 1;
        self.next_allowed = Some(now + min_interval);
    }
}
