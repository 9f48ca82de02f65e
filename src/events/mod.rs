//! Event system for pipeline state notifications
//!
//! The controller and its workers publish [`PipelineEvent`]s on a broadcast
//! bus so a host UI can follow mode changes, recording counts, playback
//! progress and detector faults without polling.

pub mod types;

pub use types::PipelineEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for pipeline events
///
/// ```no_run
/// use mocap_pipeline::events::{EventBus, PipelineEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PipelineEvent::StateChanged {
///     state: "live_selected".to_string(),
///     source: Some("camera".to_string()),
/// });
///
/// tokio::spawn(async move {
///     while let Ok(event) = rx.recv().await {
///         println!("{}", event.event_name());
///     }
/// });
/// ```
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to all current subscribers; dropped when there are none
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Receive all future events
    ///
    /// A subscriber that falls more than the channel capacity behind gets a
    /// `Lagged` error and misses the overwritten events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
