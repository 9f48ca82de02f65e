//! Pipeline state

use serde::Serialize;
use std::fmt;

use super::publisher::ProducerKind;
use crate::capture::SourceHandle;
use crate::playback::PlaybackLoop;

/// The controller's current state; exactly one holds at a time
///
/// The accumulating recording lives in the controller's recorder, which is
/// active exactly while the state is `Recording`.
#[derive(Default)]
pub enum PipelineState {
    #[default]
    Idle,
    LiveSelected(SourceHandle),
    Recording(SourceHandle),
    PlaybackLoaded(PlaybackLoop),
    PlaybackRunning(PlaybackLoop),
}

impl PipelineState {
    pub fn mode(&self) -> PipelineMode {
        match self {
            PipelineState::Idle => PipelineMode::Idle,
            PipelineState::LiveSelected(_) => PipelineMode::LiveSelected,
            PipelineState::Recording(_) => PipelineMode::Recording,
            PipelineState::PlaybackLoaded(_) => PipelineMode::PlaybackLoaded,
            PipelineState::PlaybackRunning(_) => PipelineMode::PlaybackRunning,
        }
    }

    /// The selected live source, if any
    pub fn source(&self) -> Option<&SourceHandle> {
        match self {
            PipelineState::LiveSelected(source) | PipelineState::Recording(source) => Some(source),
            _ => None,
        }
    }

    pub fn player(&self) -> Option<&PlaybackLoop> {
        match self {
            PipelineState::PlaybackLoaded(player) | PipelineState::PlaybackRunning(player) => {
                Some(player)
            }
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlaybackLoop> {
        match self {
            PipelineState::PlaybackLoaded(player) | PipelineState::PlaybackRunning(player) => {
                Some(player)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::LiveSelected(source) => write!(f, "LiveSelected({})", source.name()),
            PipelineState::Recording(source) => write!(f, "Recording({})", source.name()),
            PipelineState::PlaybackLoaded(player) => write!(
                f,
                "PlaybackLoaded({}/{} @ {}x)",
                player.cursor(),
                player.len(),
                player.speed()
            ),
            PipelineState::PlaybackRunning(player) => write!(
                f,
                "PlaybackRunning({}/{} @ {}x)",
                player.cursor(),
                player.len(),
                player.speed()
            ),
        }
    }
}

/// Data-free view of [`PipelineState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    Idle,
    LiveSelected,
    Recording,
    PlaybackLoaded,
    PlaybackRunning,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Idle => "idle",
            PipelineMode::LiveSelected => "live_selected",
            PipelineMode::Recording => "recording",
            PipelineMode::PlaybackLoaded => "playback_loaded",
            PipelineMode::PlaybackRunning => "playback_running",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the pipeline for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub mode: PipelineMode,
    /// Selected live source name
    pub source: Option<String>,
    /// Producer currently attached to the publisher
    pub producer: Option<ProducerKind>,
    /// Frames in the in-progress recording
    pub recording_frames: usize,
    /// Playback cursor, when a sequence is loaded
    pub cursor: Option<usize>,
    pub total_frames: Option<usize>,
    /// Speed applied to the loaded sequence and to sequences loaded later
    pub speed: f64,
    /// Whether a live detection loop is currently armed
    pub live_armed: bool,
    /// Last detector fault, cleared when live capture is re-armed
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::HostVideoSource;
    use crate::config::PlaybackConfig;
    use crate::landmarks::FrameSequence;
    use std::sync::Arc;

    #[test]
    fn test_mode_and_accessors() {
        let source: SourceHandle = Arc::new(HostVideoSource::new("cam"));
        let state = PipelineState::Recording(source);
        assert_eq!(state.mode(), PipelineMode::Recording);
        assert_eq!(state.source().unwrap().name(), "cam");
        assert_eq!(format!("{:?}", state), "Recording(cam)");

        let player = PlaybackLoop::new(Arc::new(FrameSequence::new()), &PlaybackConfig::default());
        let state = PipelineState::PlaybackLoaded(player);
        assert!(state.player().is_some());
        assert!(state.source().is_none());

        assert_eq!(PipelineState::default().mode().as_str(), "idle");
    }

    #[test]
    fn test_status_serialization() {
        let status = PipelineStatus {
            mode: PipelineMode::PlaybackRunning,
            source: None,
            producer: Some(ProducerKind::Playback),
            recording_frames: 0,
            cursor: Some(12),
            total_frames: Some(90),
            speed: 1.5,
            live_armed: false,
            last_error: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["mode"], "playback_running");
        assert_eq!(json["producer"], "playback");
        assert_eq!(json["totalFrames"], 90);
        assert_eq!(json["speed"], 1.5);
    }
}
