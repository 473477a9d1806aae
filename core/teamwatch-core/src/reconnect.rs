//! Reconnect backoff for the client loop.
//!
//! The first few attempts inside the sliding window retry immediately; every
//! further attempt waits one more step, capped at the maximum. The reducers
//! never see this; it only decides when the caller invokes
//! `Monitor::reconnect`.

use chrono::{DateTime, Duration, Utc};
use std::cmp;
use std::time::Duration as StdDuration;

use crate::config::ReconnectConfig;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    window_secs: i64,
    free_attempts: usize,
    step_secs: u64,
    max_secs: u64,
    attempts: Vec<DateTime<Utc>>,
}

impl ReconnectBackoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            window_secs: i64::try_from(config.window_secs).unwrap_or(i64::MAX),
            free_attempts: config.free_attempts,
            step_secs: config.step_secs,
            max_secs: config.max_secs,
            attempts: Vec::new(),
        }
    }

    /// Records an attempt at `now` and returns how long to wait before it.
    pub fn next_delay(&mut self, now: DateTime<Utc>) -> StdDuration {
        let window = Duration::seconds(self.window_secs);
        self.attempts
            .retain(|attempt| now.signed_duration_since(*attempt) <= window);
        self.attempts.push(now);

        if self.attempts.len() <= self.free_attempts {
            return StdDuration::ZERO;
        }

        let extra = self.attempts.len().saturating_sub(self.free_attempts) as u64;
        let backoff = self.step_secs.saturating_mul(extra);
        StdDuration::from_secs(cmp::min(backoff, self.max_secs))
    }

    /// Called once a connection is healthy again.
    pub fn reset(&mut self) {
        self.attempts.clear();
    }

    pub fn attempts_in_window(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> ReconnectBackoff {
        ReconnectBackoff::new(&ReconnectConfig {
            enabled: true,
            window_secs: 120,
            free_attempts: 3,
            step_secs: 10,
            max_secs: 25,
        })
    }

    #[test]
    fn first_attempts_are_immediate() {
        let mut backoff = backoff();
        let now = Utc::now();
        for _ in 0..3 {
            assert_eq!(backoff.next_delay(now), StdDuration::ZERO);
        }
    }

    #[test]
    fn delay_grows_after_threshold_and_caps() {
        let mut backoff = backoff();
        let now = Utc::now();
        for _ in 0..3 {
            backoff.next_delay(now);
        }

        assert_eq!(backoff.next_delay(now), StdDuration::from_secs(10));
        assert_eq!(backoff.next_delay(now), StdDuration::from_secs(20));
        assert_eq!(backoff.next_delay(now), StdDuration::from_secs(25));
    }

    #[test]
    fn window_expiry_forgets_old_attempts() {
        let mut backoff = backoff();
        let now = Utc::now();
        for _ in 0..5 {
            backoff.next_delay(now - Duration::seconds(300));
        }

        assert_eq!(backoff.next_delay(now), StdDuration::ZERO);
        assert_eq!(backoff.attempts_in_window(), 1);
    }

    #[test]
    fn reset_clears_history() {
        let mut backoff = backoff();
        let now = Utc::now();
        for _ in 0..6 {
            backoff.next_delay(now);
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(now), StdDuration::ZERO);
    }
}
