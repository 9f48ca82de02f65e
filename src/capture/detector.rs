//! Landmark detector boundary
//!
//! The holistic detector is an external collaborator: it takes one image and
//! eventually yields one landmark result. [`DetectionAdapter`] wraps it and
//! guarantees that at most one submission is outstanding, so detection runs
//! at the detector's pace instead of queueing behind the video frame rate.
//!
//! Each accepted submission runs in its own task that owns the in-flight
//! slot. A caller that stops waiting does not cancel the detector call; the
//! slot is released only when the detector answers.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::source::VideoImage;
use crate::config::DetectorOptions;
use crate::error::{AppError, Result};
use crate::landmarks::LandmarkFrame;

/// External holistic landmark detector
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    /// Detector name for logs
    fn name(&self) -> &str;

    /// Apply detector options; called once when the adapter is built
    fn configure(&self, _options: &DetectorOptions) {}

    /// Run detection on one image
    async fn detect(&self, image: &VideoImage) -> Result<LandmarkFrame>;
}

/// Detection statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Submissions refused because one was already in flight
    pub rejected: u64,
}

/// Clears the in-flight flag once the detection task is done with it
struct InFlightGuard(Arc<DetectionAdapter>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Detector wrapper enforcing one outstanding submission
pub struct DetectionAdapter {
    detector: Arc<dyn LandmarkDetector>,
    in_flight: AtomicBool,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl DetectionAdapter {
    pub fn new(detector: Arc<dyn LandmarkDetector>, options: &DetectorOptions) -> Self {
        info!(
            "Using landmark detector {} (complexity {}, detection {:.2}, tracking {:.2})",
            detector.name(),
            options.model_complexity,
            options.min_detection_confidence,
            options.min_tracking_confidence
        );
        detector.configure(options);
        Self {
            detector,
            in_flight: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Submit one image and wait for its result
    ///
    /// Returns `AppError::DetectorBusy` without touching the detector if a
    /// previous submission has not been answered. Detector faults are
    /// reported as `AppError::DetectionFailure`. Dropping the returned future
    /// only stops waiting: the slot stays taken until the detector answers.
    pub async fn submit(self: &Arc<Self>, image: &VideoImage) -> Result<LandmarkFrame> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(AppError::DetectorBusy);
        }
        let guard = InFlightGuard(self.clone());
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let image = image.clone();
        let task = tokio::spawn(async move {
            let guard = guard;
            guard.0.detect(&image).await
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(AppError::DetectionFailure(format!("detection task failed: {}", e)))
            }
        }
    }

    async fn detect(&self, image: &VideoImage) -> Result<LandmarkFrame> {
        match self.detector.detect(image).await {
            Ok(frame) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                Ok(frame)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                debug!("Detector {} failed: {}", self.detector.name(), e);
                match e {
                    AppError::DetectionFailure(_) => Err(e),
                    other => Err(AppError::DetectionFailure(other.to_string())),
                }
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn stats(&self) -> DetectionStats {
        DetectionStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
