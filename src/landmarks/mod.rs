//! Landmark data model
//!
//! A [`LandmarkFrame`] is one instant of holistic detection output (face,
//! pose and both hands). Recording timestamps each frame into a
//! [`RecordedFrame`]; an ordered list of those is a [`FrameSequence`], which
//! is also the on-disk exchange format.

pub mod sequence;
pub mod types;

pub use sequence::{FrameSequence, SequenceSummary};
pub use types::{Landmark, LandmarkFrame, LandmarkGroup, RecordedFrame};
