//! Utility modules shared by the capture, recording and playback paths.

pub mod throttle;

pub use throttle::LogThrottler;
