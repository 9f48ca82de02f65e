//! Pipeline event types

use serde::{Deserialize, Serialize};

/// Pipeline event enumeration
///
/// Serialized as
/// ```json
/// {
///   "event": "pipeline.state_changed",
///   "data": { "state": "recording", "source": "camera" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PipelineEvent {
    // ============================================================================
    // Controller
    // ============================================================================
    /// The controller entered a new state
    #[serde(rename = "pipeline.state_changed")]
    StateChanged {
        /// "idle", "live_selected", "recording", "playback_loaded", "playback_running"
        state: String,
        /// Name of the live source, if one is selected
        source: Option<String>,
    },

    // ============================================================================
    // Recording
    // ============================================================================
    #[serde(rename = "recording.started")]
    RecordingStarted { source: String },

    /// Recording was finalized; `frames` is the length of the returned sequence
    #[serde(rename = "recording.finished")]
    RecordingFinished { frames: usize },

    // ============================================================================
    // Playback
    // ============================================================================
    #[serde(rename = "playback.sequence_loaded")]
    SequenceLoaded { frames: usize, duration_secs: f64 },

    /// Periodic progress report while playback is running
    #[serde(rename = "playback.progress")]
    PlaybackProgress {
        frame: usize,
        total_frames: usize,
        has_face: bool,
        has_pose: bool,
        has_left_hand: bool,
        has_right_hand: bool,
    },

    // ============================================================================
    // Capture
    // ============================================================================
    /// The detector faulted; live capture is paused until the next play action
    #[serde(rename = "capture.detection_failed")]
    DetectionFailed {
        source: String,
        /// Error code, e.g. "detection_failure"
        code: String,
        reason: String,
    },
}

impl PipelineEvent {
    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "pipeline.state_changed",
            Self::RecordingStarted { .. } => "recording.started",
            Self::RecordingFinished { .. } => "recording.finished",
            Self::SequenceLoaded { .. } => "playback.sequence_loaded",
            Self::PlaybackProgress { .. } => "playback.progress",
            Self::DetectionFailed { .. } => "capture.detection_failed",
        }
    }
}
