//! Detector doubles for tests

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use super::detector::LandmarkDetector;
use super::source::VideoImage;
use crate::config::DetectorOptions;
use crate::error::{AppError, Result};
use crate::landmarks::{Landmark, LandmarkFrame};

pub fn test_image(media_time: f64) -> VideoImage {
    VideoImage::new(2, 2, Bytes::from_static(&[0u8; 12]), media_time)
}

/// Frame tagged with a marker in the first pose landmark's `x`
pub fn marked_frame(marker: f64) -> LandmarkFrame {
    LandmarkFrame {
        pose_landmarks: Some(vec![Landmark::with_visibility(marker, 0.0, 0.0, 1.0)]),
        ..Default::default()
    }
}

pub fn marker_of(frame: &LandmarkFrame) -> Option<f64> {
    frame.pose_landmarks.as_ref().and_then(|p| p.first()).map(|l| l.x)
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Detector whose completions are released by the test
pub struct GatedDetector {
    pending: Mutex<VecDeque<oneshot::Sender<Result<LandmarkFrame>>>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedDetector {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wait until `n` detections are waiting for completion.
    /// Sleeps rather than yields so a paused test clock can auto-advance.
    pub async fn wait_for_pending(&self, n: usize) {
        while self.pending() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Complete the oldest outstanding detection
    pub fn complete(&self, result: Result<LandmarkFrame>) {
        if let Some(tx) = self.pending.lock().pop_front() {
            let _ = tx.send(result);
        }
    }
}

#[async_trait]
impl LandmarkDetector for GatedDetector {
    fn name(&self) -> &str {
        "gated"
    }

    async fn detect(&self, _image: &VideoImage) -> Result<LandmarkFrame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().push_back(tx);
        rx.await
            .unwrap_or_else(|_| Err(AppError::DetectionFailure("completion dropped".to_string())))
    }
}

/// Detector that answers immediately with a frame marked by the image's media time
pub struct EchoDetector {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    complexity: Mutex<Option<u8>>,
}

impl EchoDetector {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            complexity: Mutex::new(None),
        }
    }

    /// Fault on the given (1-based) call
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn configured_complexity(&self) -> Option<u8> {
        *self.complexity.lock()
    }
}

#[async_trait]
impl LandmarkDetector for EchoDetector {
    fn name(&self) -> &str {
        "echo"
    }

    fn configure(&self, options: &DetectorOptions) {
        *self.complexity.lock() = Some(options.model_complexity);
    }

    async fn detect(&self, image: &VideoImage) -> Result<LandmarkFrame> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(AppError::DetectionFailure("model crashed".to_string()));
        }
        Ok(marked_frame(image.media_time))
    }
}
