//! Cooperative stop signal shared by every execution unit.
//!
//! There is no forced preemption. A Source or Sink observes the signal at its
//! next suspension point: a poll-interval sleep, a mailbox wait, or an
//! explicit [`StopSignal::is_stop_requested`] check.
//!
//! The flag is an [`AtomicBool`] so the hot paths read it without locks; a
//! [`Notify`] wakes any unit currently parked on [`StopSignal::stopped`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct StopState {
    /// Whether a stop has been requested.
    requested: AtomicBool,
    /// Wakes every unit parked on [`StopSignal::stopped`].
    notify: Notify,
}

/// Cloneable handle to a shared stop request.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    state: Arc<StopState>,
}

impl StopSignal {
    /// Create a signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every waiting unit. Idempotent.
    pub fn request_stop(&self) {
        self.state.requested.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.state.requested.load(Ordering::Acquire)
    }

    /// Wait until a stop has been requested.
    ///
    /// Returns immediately if the signal is already raised.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent
            // `request_stop` cannot slip between the check and the wait.
            let notified = self.state.notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless a stop arrives first.
    ///
    /// Returns `true` if the sleep was cut short by a stop request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.stopped() => true,
            () = tokio::time::sleep(duration) => self.is_stop_requested(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initially_not_requested() {
        let stop = StopSignal::new();
        assert!(!stop.is_stop_requested());
    }

    #[test]
    fn clones_share_the_request() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.request_stop();
        assert!(stop.is_stop_requested());
    }

    #[tokio::test]
    async fn stopped_returns_once_raised() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.stopped().await })
        };
        tokio::task::yield_now().await;
        stop.request_stop();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_cut_short_by_stop() {
        let stop = StopSignal::new();
        let sleeper = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.sleep(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;
        stop.request_stop();
        assert!(matches!(sleeper.await, Ok(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_stop() {
        let stop = StopSignal::new();
        assert!(!stop.sleep(Duration::from_millis(50)).await);
    }
}
