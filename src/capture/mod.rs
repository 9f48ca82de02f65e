//! Live capture
//!
//! ```text
//! VideoSource --grab--> LiveCaptureLoop --submit--> DetectionAdapter --> LandmarkDetector
//!                             |
//!                             +--deliver--> LiveSink (publisher + recorder)
//! ```

pub mod detector;
pub mod live;
pub mod source;

#[cfg(test)]
pub(crate) mod stub;

pub use detector::{DetectionAdapter, DetectionStats, LandmarkDetector};
pub use live::{LiveCaptureHandle, LiveCaptureLoop, LiveExit, LiveSink};
pub use source::{HostVideoSource, SourceHandle, SourceStatus, VideoImage, VideoSource};
