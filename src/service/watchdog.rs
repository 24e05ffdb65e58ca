//! Keepalive watchdog.
//!
//! The server promises to send something at least every
//! `keepalive_timeout_seconds`. The watchdog counts down from that interval
//! plus a one second margin and is rearmed by every frame that proves the
//! connection is alive. Expiry means the connection went silent.

use std::time::Duration;


use super::timer::Timer;

/// Slack added to the server-declared keepalive interval.
pub const SILENCE_MARGIN: Duration = Duration::from_secs(1);

/// Interval used before any welcome declared one.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(10);

/// Silence detector for the current session.
#[derive(Debug)]
pub struct Watchdog {
    timer: Timer,
    interval: Duration,
}

impl Watchdog {
    /// Creates a disarmed watchdog with the given initial interval.
    #[must_use]
    pub const fn new(initial: Duration) -> Self {
        Self {
            timer: Timer::new(),
            interval: initial,
        }
    }

    /// Arms the countdown. With `Some(keepalive)` the interval becomes
    /// `keepalive + SILENCE_MARGIN`; with `None` the previous interval is
    /// kept.
    pub fn arm(&mut self, keepalive: Option<Duration>) {
        if let Some(keepalive) = keepalive {
            self.interval = keepalive.saturating_add(SILENCE_MARGIN);
        }
        self.timer.arm(self.interval);
    }

    /// Restarts the countdown with the current interval.
    pub fn reset(&mut self) {
        self.timer.arm(self.interval);
    }

    /// Stops the countdown.
    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// Returns the interval the next arm or reset will use.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` while the countdown is running.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Completes once the connection went silent. One-shot: the watchdog
    /// must be rearmed before it can fire again.
    pub async fn expired(&mut self) {
        self.timer.expired().await;
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE)
    }
}
