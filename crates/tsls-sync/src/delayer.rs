//! Trailing-edge debouncing.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Debounces a parameterless action with a trailing delay.
///
/// [`trigger`](Delayer::trigger) schedules the action to run after the
/// delay; triggering again before it fires replaces both the pending action
/// and the delay, so a burst of triggers runs the last action exactly once.
///
/// The timer runs as a Tokio task, so a `Delayer` only works inside a
/// runtime. The mutex around the handle makes replacement atomic; ordering
/// beyond that is not observable because the action itself re-synchronizes
/// on the state it touches.
pub struct Delayer {
    default_delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Delayer {
    /// Creates a delayer whose [`trigger`](Delayer::trigger) uses
    /// `default_delay`.
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            timer: Mutex::new(None),
        }
    }

    /// Schedules `action` after the default delay, replacing any pending
    /// action.
    pub fn trigger(&self, action: impl FnOnce() + Send + 'static) {
        self.trigger_with_delay(self.default_delay, action);
    }

    /// Schedules `action` after `delay`, replacing any pending action.
    pub fn trigger_with_delay(&self, delay: Duration, action: impl FnOnce() + Send + 'static) {
        let mut timer = self.timer.lock();
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Drops the pending action, if any, without running it.
    pub fn cancel(&self) {
        if let Some(pending) = self.timer.lock().take() {
            pending.abort();
        }
    }
}

impl Drop for Delayer {
    fn drop(&mut self) {
        self.cancel();
    }
}
