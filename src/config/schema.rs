use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest accepted playback speed multiplier
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
/// Highest accepted playback speed multiplier
pub const MAX_PLAYBACK_SPEED: f64 = 2.0;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Recorded sequence replay
    pub playback: PlaybackConfig,
    /// Live detection loop
    pub capture: CaptureConfig,
    /// Options handed to the external landmark detector
    pub detector: DetectorOptions,
    /// Recording export
    pub export: ExportConfig,
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frame advance rate at speed 1.0
    pub target_fps: f64,
    /// Speed multiplier, clamped to [0.1, 2.0]
    pub speed: f64,
    /// Host display refresh rate driving playback ticks
    pub refresh_hz: u32,
    /// Report progress every N advanced frames (0 disables)
    pub progress_log_interval: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            speed: 1.0,
            refresh_hz: 60,
            progress_log_interval: 30,
        }
    }
}

impl PlaybackConfig {
    /// Clamp a requested speed into the accepted range
    pub fn clamp_speed(speed: f64) -> f64 {
        if speed.is_nan() {
            return 1.0;
        }
        speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
    }
}

/// Live capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Wait between a published detection result and the next submission
    /// (one display refresh)
    pub rearm_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            rearm_interval_ms: 16,
        }
    }
}

/// Holistic detector options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// 0, 1 or 2; higher is more accurate and slower
    pub model_complexity: u8,
    pub smooth_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Emit iris landmarks (478 face points instead of 468)
    pub refine_face_landmarks: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model_complexity: 1,
            smooth_landmarks: true,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            refine_face_landmarks: true,
        }
    }
}

/// Recording export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported recordings are written to
    pub directory: PathBuf,
    /// File name prefix, followed by an ISO-8601 timestamp
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "landmark-data".to_string(),
        }
    }
}
