//! Recording buffer for detected frames

use tracing::{debug, info};

use crate::landmarks::{FrameSequence, LandmarkFrame, RecordedFrame};
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Accumulates detected frames while a recording session is active
///
/// Frames are kept in arrival order. A timestamp that goes backwards (the
/// source was seeked) is still appended; playback relies on arrival order,
/// not on timestamps.
pub struct Recorder {
    frames: FrameSequence,
    active: bool,
    last_timestamp: Option<f64>,
    regressions: u64,
    throttler: LogThrottler,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            frames: FrameSequence::new(),
            active: false,
            last_timestamp: None,
            regressions: 0,
            throttler: LogThrottler::default(),
        }
    }

    /// Begin a session; the buffer always starts empty
    pub fn start(&mut self) {
        if self.active && !self.frames.is_empty() {
            debug!("Restarting recording, dropping {} frames", self.frames.len());
        }
        self.frames = FrameSequence::new();
        self.last_timestamp = None;
        self.regressions = 0;
        self.active = true;
        info!("Recording started");
    }

    /// Append one frame. No-op unless a session is active.
    pub fn append(&mut self, frame: LandmarkFrame, timestamp: f64) -> bool {
        if !self.active {
            return false;
        }

        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.regressions += 1;
                warn_throttled!(
                    self.throttler,
                    "recorder_timestamp_regression",
                    "Recording timestamp went backwards ({:.3}s after {:.3}s), keeping arrival order",
                    timestamp,
                    last
                );
            }
        }

        self.last_timestamp = Some(timestamp);
        self.frames.push(RecordedFrame::new(frame, timestamp));
        true
    }

    /// End the session and hand over everything recorded so far.
    /// Yields an empty sequence if nothing was recorded.
    pub fn finalize(&mut self) -> FrameSequence {
        let frames = std::mem::take(&mut self.frames);
        if self.active {
            info!(
                "Recording finished with {} frames ({} timestamp regressions)",
                frames.len(),
                self.regressions
            );
        }
        self.active = false;
        self.last_timestamp = None;
        self.regressions = 0;
        frames
    }

    /// End the session and drop the buffer
    pub fn discard(&mut self) {
        if self.active {
            debug!("Discarding recording with {} frames", self.frames.len());
        }
        self.frames = FrameSequence::new();
        self.active = false;
        self.last_timestamp = None;
        self.regressions = 0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frames recorded in the current session
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Appends whose timestamp was earlier than the previous one
    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
