//! Replay of recorded frame sequences

mod player;
mod ticker;

pub use player::{PlaybackLoop, TickOutcome};
pub use ticker::PlaybackTicker;
