//! Backoff pacing for the completion-event read loop
//!
//! Unlike a retry helper that wraps a single fallible operation, this tracks
//! pacing across an unbounded read loop: a transient error grows the delay
//! exponentially with jitter, while a clean read (including a deadline with
//! no message) resets it back to the floor.

use rand::Rng;
use std::time::Duration;

const FLOOR: Duration = Duration::from_millis(500);
const CEILING: Duration = Duration::from_secs(5);
const JITTER_MAX_MS: u64 = 250;

/// Tracks the current backoff delay for a consumer's read loop.
#[derive(Debug, Clone)]
pub struct ConsumerBackoff {
    current: Duration,
}

impl ConsumerBackoff {
    pub fn new() -> Self {
        Self { current: FLOOR }
    }

    /// Call after a read that completed without error (message or deadline).
    /// Resets pacing back to the floor.
    pub fn record_success(&mut self) {
        self.current = FLOOR;
    }

    /// Call after a read error. Returns the delay to sleep before retrying,
    /// then doubles the tracked delay (capped) with jitter added on top.
    pub fn record_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, CEILING);
        let jitter_ms = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl Default for ConsumerBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_floor() {
        let backoff = ConsumerBackoff::new();
        assert_eq!(backoff.current, FLOOR);
    }

    #[test]
    fn doubles_and_caps_on_repeated_failure() {
        let mut backoff = ConsumerBackoff::new();
        let d1 = backoff.record_failure();
        assert!(d1 >= FLOOR && d1 < FLOOR + Duration::from_millis(JITTER_MAX_MS) + Duration::from_millis(1));

        for _ in 0..10 {
            backoff.record_failure();
        }
        assert_eq!(backoff.current, CEILING);
    }

    #[test]
    fn success_resets_to_floor() {
        let mut backoff = ConsumerBackoff::new();
        backoff.record_failure();
        backoff.record_failure();
        assert!(backoff.current > FLOOR);

        backoff.record_success();
        assert_eq!(backoff.current, FLOOR);
    }
}
