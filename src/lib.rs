//! mocap-pipeline - Motion-capture frame pipeline
//!
//! Drives an external holistic landmark detector against a playing video,
//! records the detected frames into sequences, and replays recorded
//! sequences at an adjustable speed. Live capture and playback publish
//! through one single-slot [`pipeline::FramePublisher`], and the
//! [`pipeline::PipelineController`] guarantees that at most one of them is
//! attached at any instant.

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod landmarks;
pub mod pipeline;
pub mod playback;
pub mod recording;
pub mod utils;

pub use error::{AppError, Result};
