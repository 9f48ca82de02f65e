//! Frame sequences and their JSON file format
//!
//! The file format is a pretty-printed JSON array of recorded frames:
//!
//! ```json
//! [
//!   {
//!     "timestamp": 0.0,
//!     "poseLandmarks": [{ "x": 0.5, "y": 0.4, "z": -0.1, "visibility": 0.98 }],
//!     "leftHandLandmarks": [{ "x": 0.3, "y": 0.6, "z": 0.0 }]
//!   }
//! ]
//! ```
//!
//! Absent groups are omitted on output and accepted as missing or `null` on
//! input. A bare array of landmark frames (no `timestamp`) also loads.

use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::path::Path;

use super::types::{LandmarkGroup, RecordedFrame};
use crate::error::{AppError, Result};

/// Ordered list of recorded frames, in recording order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameSequence(Vec<RecordedFrame>);

impl FrameSequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RecordedFrame> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordedFrame> {
        self.0.iter()
    }

    pub fn push(&mut self, frame: RecordedFrame) {
        self.0.push(frame);
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.0
    }

    pub fn into_frames(self) -> Vec<RecordedFrame> {
        self.0
    }

    /// Serialize to the pretty-printed export format
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Parse the exchange format; any malformation is a `LoadFailure`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<Vec<RecordedFrame>>(json)
            .map(Self)
            .map_err(|e| AppError::LoadFailure(format!("malformed sequence: {}", e)))
    }

    /// Read and parse a sequence file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::LoadFailure(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn summary(&self) -> SequenceSummary {
        let mut summary = SequenceSummary {
            total_frames: self.len(),
            first_timestamp: self.0.first().map(|f| f.timestamp),
            last_timestamp: self.0.last().map(|f| f.timestamp),
            ..Default::default()
        };

        for recorded in &self.0 {
            let frame = &recorded.frame;
            if frame.is_empty() {
                summary.empty_frames += 1;
            }
            for group in LandmarkGroup::all() {
                if frame.has(*group) {
                    match group {
                        LandmarkGroup::Face => summary.face_frames += 1,
                        LandmarkGroup::Pose => summary.pose_frames += 1,
                        LandmarkGroup::LeftHand => summary.left_hand_frames += 1,
                        LandmarkGroup::RightHand => summary.right_hand_frames += 1,
                    }
                }
            }
        }

        summary
    }
}

impl From<Vec<RecordedFrame>> for FrameSequence {
    fn from(frames: Vec<RecordedFrame>) -> Self {
        Self(frames)
    }
}

impl Index<usize> for FrameSequence {
    type Output = RecordedFrame;

    fn index(&self, index: usize) -> &RecordedFrame {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a RecordedFrame;
    type IntoIter = std::slice::Iter<'a, RecordedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Overview of a sequence, logged on load and printed by `inspect`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SequenceSummary {
    pub total_frames: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    /// Frames with no landmark group at all
    pub empty_frames: usize,
    pub face_frames: usize,
    pub pose_frames: usize,
    pub left_hand_frames: usize,
    pub right_hand_frames: usize,
}

impl SequenceSummary {
    /// Media time spanned by the recording, in seconds
    pub fn duration(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => 0.0,
        }
    }
}
