//! Display-refresh scheduling for playback
//!
//! The ticker stands in for the host's per-frame callback: it invokes a
//! closure at the refresh rate with the time elapsed since it started. It is
//! the only scheduling registration a running playback holds, so cancelling
//! it is enough to guarantee no further publishes.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Cancellable periodic tick registration; cancels itself when dropped
pub struct PlaybackTicker {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PlaybackTicker {
    /// Start ticking at `refresh_hz`
    ///
    /// `on_tick` receives the monotonic time since the ticker started and
    /// returns `false` to stop ticking. The first tick fires immediately.
    pub fn spawn<F>(refresh_hz: u32, mut on_tick: F) -> Self
    where
        F: FnMut(Duration) -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    at = interval.tick() => {
                        if token.is_cancelled() || !on_tick(at.duration_since(start)) {
                            break;
                        }
                    }
                }
            }
            trace!("Playback ticker stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop ticking; safe to call repeatedly
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(ref task) = self.task {
            task.abort();
        }
    }
}

impl Drop for PlaybackTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}
