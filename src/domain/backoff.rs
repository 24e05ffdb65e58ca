//! Linear reconnect backoff.
//!
//! Every policy-driven reconnect increments the attempt counter and waits
//! `attempts × step`. A successful open resets the counter, so the first
//! failure after a healthy connection always waits exactly one step.

use std::time::Duration;

/// Default delay unit between reconnect attempts, in milliseconds.
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 100;

/// Default delay unit between reconnect attempts.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(DEFAULT_BACKOFF_STEP_MS);

/// Consecutive-failure counter with linear delay growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    attempts: u32,
    step: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// Creates a backoff with the given step and optional delay cap.
    #[must_use]
    pub const fn new(step: Duration, max: Option<Duration>) -> Self {
        Self {
            attempts: 0,
            step,
            max,
        }
    }

    /// Returns the number of reconnects scheduled since the last open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay that the next call to [`Backoff::schedule`] will return,
    /// without changing the counter.
    #[must_use]
    pub fn peek(&self) -> Duration {
        self.delay_for(self.attempts.saturating_add(1))
    }

    /// Records one more reconnect attempt and returns how long to wait
    /// before making it.
    pub fn schedule(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.delay_for(self.attempts)
    }

    /// Resets the counter after a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    fn delay_for(&self, attempts: u32) -> Duration {
        let delay = self.step.saturating_mul(attempts);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_STEP, None)
    }
}
