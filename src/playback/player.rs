//! Tick-driven sequence replay
//!
//! [`PlaybackLoop`] holds no timers. The host (or [`super::PlaybackTicker`])
//! calls [`PlaybackLoop::tick`] once per display refresh with a monotonic
//! time, and the loop decides which frame to publish and when to advance:
//!
//! 1. The first tick after activation records the time and publishes the
//!    frame at the cursor without advancing.
//! 2. Every later tick publishes the frame at the cursor again.
//! 3. Once at least `1 / (target_fps * speed)` has elapsed since the last
//!    advance, the cursor moves to the next frame (wrapping at the end) and
//!    the advance time is reset to the tick time.
//!
//! Because the cursor advances at most once per tick, a frame is published
//! repeatedly while the loop dwells on it.

use std::sync::Arc;
use std::time::Duration;

use crate::config::PlaybackConfig;
use crate::landmarks::{FrameSequence, LandmarkFrame};

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Index of the frame to publish for this tick
    pub published: usize,
    /// New cursor position if the tick advanced it
    pub advanced_to: Option<usize>,
}

/// Cyclic replay state over an immutable sequence
#[derive(Debug, Clone)]
pub struct PlaybackLoop {
    sequence: Arc<FrameSequence>,
    target_fps: f64,
    speed: f64,
    cursor: usize,
    last_advance: Option<Duration>,
}

impl PlaybackLoop {
    pub fn new(sequence: Arc<FrameSequence>, config: &PlaybackConfig) -> Self {
        Self {
            sequence,
            target_fps: if config.target_fps > 0.0 {
                config.target_fps
            } else {
                PlaybackConfig::default().target_fps
            },
            speed: PlaybackConfig::clamp_speed(config.speed),
            cursor: 0,
            last_advance: None,
        }
    }

    /// Process one scheduling tick at monotonic time `now`
    ///
    /// Returns `None` for an empty sequence.
    pub fn tick(&mut self, now: Duration) -> Option<TickOutcome> {
        if self.sequence.is_empty() {
            return None;
        }

        let published = self.cursor;
        let last = match self.last_advance {
            Some(last) => last,
            None => {
                self.last_advance = Some(now);
                return Some(TickOutcome {
                    published,
                    advanced_to: None,
                });
            }
        };

        let mut advanced_to = None;
        if now.saturating_sub(last) >= self.advance_interval() {
            self.cursor = (self.cursor + 1) % self.sequence.len();
            self.last_advance = Some(now);
            advanced_to = Some(self.cursor);
        }

        Some(TickOutcome {
            published,
            advanced_to,
        })
    }

    /// Minimum time between two cursor advances at the current speed
    pub fn advance_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (self.target_fps * self.speed))
    }

    pub fn frame(&self, index: usize) -> Option<&LandmarkFrame> {
        self.sequence.get(index).map(|recorded| &recorded.frame)
    }

    pub fn current_frame(&self) -> Option<&LandmarkFrame> {
        self.frame(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Back to frame 0; the next tick publishes without advancing
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.last_advance = None;
    }

    /// Forget the advance time so a resumed loop starts timing afresh
    pub fn rearm(&mut self) {
        self.last_advance = None;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the speed multiplier (clamped); returns the applied value
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = PlaybackConfig::clamp_speed(speed);
        self.speed
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence(&self) -> &Arc<FrameSequence> {
        &self.sequence
    }
}
