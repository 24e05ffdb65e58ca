//! One-shot cancellable timer.
//!
//! A [`Timer`] is a deadline owned by the controller loop, not a spawned
//! task: arming replaces the deadline, cancelling clears it, and dropping
//! the timer makes it impossible for it to fire.

use std::time::Duration;

use tokio::time::Instant;

/// Horizon used for deadlines that would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns the instant `after` from now, saturating at a far-future
/// deadline instead of overflowing.
#[must_use]
pub fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Single outstanding countdown.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Creates a disarmed timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Starts the countdown, replacing any running one.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(deadline_after(after));
    }

    /// Stops the countdown. A no-op when disarmed.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` while a countdown is running.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes when the countdown ends and disarms the timer.
    ///
    /// Never completes while disarmed. Cancel safe: dropping the future
    /// leaves the countdown running.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_deadline() {
        let mut timer = Timer::new();
        timer.arm(Duration::from_secs(5));
        let start = Instant::now();

        timer.expired().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = Timer::new();
        timer.arm(Duration::from_secs(1));
        timer.cancel();

        let mut expired = task::spawn(timer.expired());
        assert_pending!(expired.poll());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_pending!(expired.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_pushes_deadline_back() {
        let mut timer = Timer::new();
        timer.arm(Duration::from_secs(2));
        tokio::time::advance(Duration::from_secs(1)).await;
        timer.arm(Duration::from_secs(2));

        {
            let mut expired = task::spawn(timer.expired());
            tokio::time::advance(Duration::from_millis(1500)).await;
            assert_pending!(expired.poll());
            tokio::time::advance(Duration::from_millis(500)).await;
            assert_ready!(expired.poll());
        }
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_duration_does_not_overflow() {
        let mut timer = Timer::new();
        timer.arm(Duration::MAX);
        assert!(timer.is_armed());
        assert!(deadline_after(Duration::MAX) > Instant::now());

        let mut expired = task::spawn(timer.expired());
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_pending!(expired.poll());
    }
}
