//! Live capture loop
//!
//! While the selected source is playing, the loop grabs the presented image,
//! submits it to the detector, delivers the result and re-arms after one
//! refresh interval. Re-arming happens only after a result arrived, so there
//! is never more than one detection in flight. When the source pauses or
//! ends, the loop parks on the source's status channel until it plays again.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::detector::DetectionAdapter;
use super::source::SourceHandle;
use crate::error::AppError;
use crate::landmarks::LandmarkFrame;

/// Receiver of live detection results
pub trait LiveSink: Send + Sync {
    /// Deliver one result stamped with its media time.
    /// Returns `false` if the loop no longer owns the publisher.
    fn deliver(&self, frame: LandmarkFrame, timestamp: f64) -> bool;

    /// Report a detector fault; the loop stops after this call
    fn fail(&self, error: AppError);
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveExit {
    Cancelled,
    /// The sink refused a delivery (producer detached)
    Detached,
    DetectionFailed,
    /// The source dropped its status channel
    SourceClosed,
}

pub struct LiveCaptureLoop {
    source: SourceHandle,
    adapter: Arc<DetectionAdapter>,
    sink: Arc<dyn LiveSink>,
    rearm_interval: Duration,
    cancel: CancellationToken,
}

impl LiveCaptureLoop {
    pub fn new(
        source: SourceHandle,
        adapter: Arc<DetectionAdapter>,
        sink: Arc<dyn LiveSink>,
        rearm_interval: Duration,
    ) -> Self {
        Self {
            source,
            adapter,
            sink,
            rearm_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the loop on the current runtime
    pub fn spawn(self) -> LiveCaptureHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());
        LiveCaptureHandle {
            cancel,
            task: Some(task),
        }
    }

    pub async fn run(self) -> LiveExit {
        let name = self.source.name().to_string();
        info!("Live capture armed on {}", name);
        let exit = self.run_inner().await;
        info!("Live capture on {} stopped: {:?}", name, exit);
        exit
    }

    async fn run_inner(&self) -> LiveExit {
        let mut status = self.source.subscribe();

        loop {
            // Park until the source is playing
            loop {
                let current = *status.borrow_and_update();
                if current.is_playing() {
                    break;
                }
                trace!("Live capture waiting, source is {:?}", current);
                tokio::select! {
                    _ = self.cancel.cancelled() => return LiveExit::Cancelled,
                    changed = status.changed() => {
                        if changed.is_err() {
                            return LiveExit::SourceClosed;
                        }
                    }
                }
            }

            if let Some(image) = self.source.grab() {
                let result = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return LiveExit::Cancelled,
                    result = self.adapter.submit(&image) => result,
                };

                match result {
                    Ok(frame) => {
                        if self.cancel.is_cancelled() {
                            return LiveExit::Cancelled;
                        }
                        if !self.sink.deliver(frame, image.media_time) {
                            return LiveExit::Detached;
                        }
                    }
                    // A cancelled predecessor has not released the detector yet
                    Err(AppError::DetectorBusy) => {
                        debug!("Detector busy, retrying on next refresh");
                    }
                    Err(e) => {
                        warn!("Live detection on {} failed: {}", self.source.name(), e);
                        self.sink.fail(e);
                        return LiveExit::DetectionFailed;
                    }
                }
            } else {
                trace!("No image presented yet");
            }

            // Re-arm on the next refresh
            tokio::select! {
                _ = self.cancel.cancelled() => return LiveExit::Cancelled,
                _ = tokio::time::sleep(self.rearm_interval) => {}
            }
        }
    }
}

/// Handle to a spawned live loop; cancels it when dropped
pub struct LiveCaptureHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<LiveExit>>,
}

impl LiveCaptureHandle {
    /// Stop the loop; safe to call repeatedly
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(ref task) = self.task {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the loop to stop without cancelling it.
    /// A loop aborted mid-flight reports `Cancelled`.
    pub async fn join(mut self) -> LiveExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(LiveExit::Cancelled),
            None => LiveExit::Cancelled,
        }
    }
}

impl Drop for LiveCaptureHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
