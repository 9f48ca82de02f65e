//! Video sources
//!
//! The pipeline never decodes video itself. A host player (browser element,
//! GStreamer sink, test script) implements [`VideoSource`] or drives a
//! [`HostVideoSource`], reporting play state and presenting frames.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Playback state of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Paused,
    Playing,
    Ended,
}

impl SourceStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, SourceStatus::Playing)
    }
}

/// One presented video image, as handed to the detector
#[derive(Debug, Clone)]
pub struct VideoImage {
    pub width: u32,
    pub height: u32,
    /// Packed pixel data; layout is agreed between host and detector
    pub data: Bytes,
    /// Media time of this image in seconds
    pub media_time: f64,
}

impl VideoImage {
    pub fn new(width: u32, height: u32, data: Bytes, media_time: f64) -> Self {
        Self {
            width,
            height,
            data,
            media_time,
        }
    }
}

/// A playing video the live loop can sample
pub trait VideoSource: Send + Sync {
    /// Display name, used in logs and events
    fn name(&self) -> &str;

    fn status(&self) -> SourceStatus;

    /// Receiver notified on every status change
    fn subscribe(&self) -> watch::Receiver<SourceStatus>;

    /// Current media time in seconds
    fn current_time(&self) -> f64;

    /// The currently presented image, if any
    fn grab(&self) -> Option<VideoImage>;
}

/// Shared handle to the selected source
pub type SourceHandle = Arc<dyn VideoSource>;

/// Video source whose state is pushed by the host player
pub struct HostVideoSource {
    name: String,
    status: watch::Sender<SourceStatus>,
    current: Mutex<Option<VideoImage>>,
    time: Mutex<f64>,
}

impl HostVideoSource {
    pub fn new(name: impl Into<String>) -> Self {
        let (status, _) = watch::channel(SourceStatus::Paused);
        Self {
            name: name.into(),
            status,
            current: Mutex::new(None),
            time: Mutex::new(0.0),
        }
    }

    pub fn play(&self) {
        self.status.send_replace(SourceStatus::Playing);
    }

    pub fn pause(&self) {
        self.status.send_replace(SourceStatus::Paused);
    }

    pub fn end(&self) {
        self.status.send_replace(SourceStatus::Ended);
    }

    /// Present a new image; media time follows the image
    pub fn present(&self, image: VideoImage) {
        *self.time.lock() = image.media_time;
        *self.current.lock() = Some(image);
    }

    /// Move the playhead without presenting a new image
    pub fn seek(&self, time: f64) {
        *self.time.lock() = time;
    }
}

impl VideoSource for HostVideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SourceStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<SourceStatus> {
        self.status.subscribe()
    }

    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn grab(&self) -> Option<VideoImage> {
        self.current.lock().clone()
    }
}
