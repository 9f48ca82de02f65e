//! Pipeline control
//!
//! ```text
//!   VideoSource ──► LiveCaptureLoop ──┐
//!                        │            │
//!                        ▼            ▼
//!                    Recorder    FramePublisher ──► consumer
//!                                     ▲
//!   FrameSequence ──► PlaybackLoop ───┘
//! ```
//!
//! [`PipelineController`] decides which of the two producers is attached to
//! the [`FramePublisher`] at any instant.

mod controller;
mod publisher;
mod state;

pub use controller::PipelineController;
pub use publisher::{
    FrameConsumer, FramePublisher, ProducerKind, ProducerLock, ProducerToken, PublisherStats,
};
pub use state::{PipelineMode, PipelineState, PipelineStatus};
