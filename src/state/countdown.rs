//! Per-question countdown expressed as a deadline plus a cancellable single-shot timer.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};

/// Countdown started the instant a question is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: Instant,
    limit: Duration,
}

impl Countdown {
    /// Start a countdown now.
    pub fn start(limit: Duration) -> Self {
        Self::start_at(Instant::now(), limit)
    }

    /// Start a countdown at an explicit instant.
    pub fn start_at(started_at: Instant, limit: Duration) -> Self {
        Self { started_at, limit }
    }

    /// Instant at which the question times out.
    pub fn deadline(&self) -> Instant {
        self.started_at + self.limit
    }

    /// Time elapsed since the question was displayed.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    /// Whether the deadline has been reached.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline()
    }
}

/// Single-shot timer that delivers `message` on `tx` once the deadline passes.
///
/// Dropping or cancelling the timer disarms it.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: JoinHandle<()>,
}

impl CountdownTimer {
    /// Arm a timer for `countdown`.
    pub fn arm<T>(countdown: &Countdown, tx: mpsc::UnboundedSender<T>, message: T) -> Self
    where
        T: Send + 'static,
    {
        let deadline = countdown.deadline();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = tx.send(message);
        });
        Self { handle }
    }

    /// Disarm the timer; a no-op if it already fired.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
