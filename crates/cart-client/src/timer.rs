//! A replaceable, cancellable one-shot timer.
//!
//! Each `schedule` bumps a generation number that is handed to the callback.
//! A callback that raced with `cancel` or a reschedule carries an old
//! generation, which [`CancellableTimer::is_current`] rejects, so a stale
//! timer can never act.

use std::time::Duration;

use tokio::task::JoinHandle;

/// One-shot timer backed by a spawned sleep task.
#[derive(Debug, Default)]
pub struct CancellableTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl CancellableTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handle: None,
            generation: 0,
        }
    }

    /// Arm the timer, replacing any pending one. `fire` runs after `after`
    /// with the generation of this arming.
    pub fn schedule<F>(&mut self, after: Duration, fire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fire(generation);
        }));
    }

    /// Disarm the timer. A no-op when nothing is pending.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a firing with `generation` belongs to the pending arming.
    #[must_use]
    pub const fn is_current(&self, generation: u64) -> bool {
        self.handle.is_some() && self.generation == generation
    }

    /// Record that the pending arming fired.
    pub fn fired(&mut self) {
        self.handle = None;
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
