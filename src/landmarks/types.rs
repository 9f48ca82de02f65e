//! Landmark frame types

use serde::{Deserialize, Serialize};

/// One detected keypoint in normalized image coordinates
///
/// Face and hand landmarks carry no visibility; pose landmarks do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: Some(visibility),
        }
    }
}

/// Landmark group of a holistic detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkGroup {
    Face,
    Pose,
    LeftHand,
    RightHand,
}

impl LandmarkGroup {
    pub fn all() -> &'static [LandmarkGroup] {
        &[
            LandmarkGroup::Face,
            LandmarkGroup::Pose,
            LandmarkGroup::LeftHand,
            LandmarkGroup::RightHand,
        ]
    }
}

/// One instant's detection result
///
/// Any group may be absent. A frame with every group absent is still a valid
/// frame and is forwarded like any other. Unknown fields produced by the
/// detector (image size, segmentation masks, ...) are ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_landmarks: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_landmarks: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand_landmarks: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand_landmarks: Option<Vec<Landmark>>,
}

impl LandmarkFrame {
    /// A frame with no landmark group present
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn group(&self, group: LandmarkGroup) -> Option<&[Landmark]> {
        match group {
            LandmarkGroup::Face => self.face_landmarks.as_deref(),
            LandmarkGroup::Pose => self.pose_landmarks.as_deref(),
            LandmarkGroup::LeftHand => self.left_hand_landmarks.as_deref(),
            LandmarkGroup::RightHand => self.right_hand_landmarks.as_deref(),
        }
    }

    pub fn has(&self, group: LandmarkGroup) -> bool {
        self.group(group).is_some()
    }

    /// True when no group was detected
    pub fn is_empty(&self) -> bool {
        LandmarkGroup::all().iter().all(|g| !self.has(*g))
    }

    /// Total number of landmarks across all present groups
    pub fn landmark_count(&self) -> usize {
        LandmarkGroup::all()
            .iter()
            .filter_map(|g| self.group(*g))
            .map(|points| points.len())
            .sum()
    }
}

/// A landmark frame stamped with its media-relative capture time (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Missing in sequences exported without timing; defaults to 0.0
    #[serde(default)]
    pub timestamp: f64,
    #[serde(flatten)]
    pub frame: LandmarkFrame,
}

impl RecordedFrame {
    pub fn new(frame: LandmarkFrame, timestamp: f64) -> Self {
        Self { timestamp, frame }
    }
}
