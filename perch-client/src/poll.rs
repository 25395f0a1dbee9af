//! Update offset and poll throttling.
//!
//! The backend keeps every update until a `getUpdates` call carries an
//! `offset` above its id, so the offset is what acknowledges an update.
//! It only ever moves forward.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum time between two `getUpdates` requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

// ─── PollState ────────────────────────────────────────────────────────────────

/// Tracks the next update id to request and when the last poll went out.
#[derive(Debug, Clone)]
pub struct PollState {
    /// Next update id to request (`0` until the first update arrives).
    offset:    i64,
    last_poll: Option<Instant>,
    interval:  Duration,
}

impl Default for PollState {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollState {
    pub fn new(interval: Duration) -> Self {
        Self { offset: 0, last_poll: None, interval }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The `offset` parameter to send, if any.
    pub fn offset_param(&self) -> Option<i64> {
        (self.offset != 0).then_some(self.offset)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// `true` if no poll went out within the last interval.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_poll {
            None       => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Stamp a poll as issued, whether or not it succeeds.
    pub fn mark_polled(&mut self, now: Instant) {
        self.last_poll = Some(now);
    }

    /// Acknowledge `update_id`. Returns `false` for the `0` placeholder id.
    pub fn advance(&mut self, update_id: i64) -> bool {
        if update_id == 0 {
            return false;
        }
        let next = update_id.saturating_add(1);
        if next > self.offset { self.offset = next; }
        true
    }

    /// Move the offset forward, e.g. to skip a backlog. Lower values are ignored.
    pub fn set_offset(&mut self, offset: i64) {
        self.offset = self.offset.max(offset);
    }
}
