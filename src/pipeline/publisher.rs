//! Single-slot frame publisher
//!
//! The publisher is the only seam between producers (live capture, playback)
//! and the rendering consumer. It holds at most one consumer and at most one
//! attached producer. Producers publish through a [`ProducerToken`]; once a
//! producer is detached its token goes stale and anything it still tries to
//! publish is dropped.
//!
//! The producer slot stays locked while a producer's frame is with the
//! consumer, so once `detach` returns no frame from the old producer can
//! still arrive. The lock is reentrant: a consumer may call back into the
//! publisher on the same thread. Callers that guard their own state
//! alongside the publisher must take [`FramePublisher::lock_producer`] before
//! that state lock, the same order a delivery takes them in.

use arc_swap::ArcSwapOption;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::landmarks::LandmarkFrame;

/// Consumer callback; must not block
pub type FrameConsumer = Arc<dyn Fn(&LandmarkFrame) + Send + Sync>;

/// Which worker currently owns the publish right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    LiveCapture,
    Playback,
}

/// Publish right handed to a producer on attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerToken {
    id: u64,
    kind: ProducerKind,
}

impl ProducerToken {
    pub fn kind(&self) -> ProducerKind {
        self.kind
    }
}

struct ConsumerSlot(FrameConsumer);

type ProducerSlot = Cell<Option<ProducerToken>>;

/// Holds the producer slot. Attach, detach and deliveries on other threads
/// wait until it is dropped; the holding thread may still use the publisher.
pub struct ProducerLock<'a> {
    _guard: ReentrantMutexGuard<'a, ProducerSlot>,
}

/// Publisher statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublisherStats {
    /// Frames handed to a consumer
    pub delivered: u64,
    /// Publishes with no consumer set
    pub unconsumed: u64,
    /// Publishes from detached producers
    pub stale: u64,
}

/// Single-slot publisher
pub struct FramePublisher {
    consumer: ArcSwapOption<ConsumerSlot>,
    producer: ReentrantMutex<ProducerSlot>,
    next_producer_id: AtomicU64,
    delivered: AtomicU64,
    unconsumed: AtomicU64,
    stale: AtomicU64,
}

impl FramePublisher {
    pub fn new() -> Self {
        Self {
            consumer: ArcSwapOption::empty(),
            producer: ReentrantMutex::new(Cell::new(None)),
            next_producer_id: AtomicU64::new(1),
            delivered: AtomicU64::new(0),
            unconsumed: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    /// Install or remove the consumer; replaces any previous one
    pub fn set_consumer(&self, consumer: Option<FrameConsumer>) {
        self.consumer.store(consumer.map(|c| Arc::new(ConsumerSlot(c))));
    }

    pub fn has_consumer(&self) -> bool {
        self.consumer.load().is_some()
    }

    /// Hand a frame to the consumer. Returns `false` when no consumer is set.
    pub fn publish(&self, frame: &LandmarkFrame) -> bool {
        // Clone the slot out so the consumer runs without any publisher state borrowed
        match self.consumer.load_full() {
            Some(slot) => {
                (slot.0)(frame);
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                self.unconsumed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Lock the producer slot for the current thread
    pub fn lock_producer(&self) -> ProducerLock<'_> {
        ProducerLock {
            _guard: self.producer.lock(),
        }
    }

    /// Give the publish right to a new producer
    ///
    /// Any previously attached producer is detached first, so its token is
    /// stale before the new one exists.
    pub fn attach(&self, kind: ProducerKind) -> ProducerToken {
        let token = ProducerToken {
            id: self.next_producer_id.fetch_add(1, Ordering::Relaxed),
            kind,
        };
        let previous = self.producer.lock().replace(Some(token));
        if let Some(previous) = previous {
            debug!("Producer {:?} replaced by {:?}", previous.kind, kind);
        } else {
            debug!("Producer {:?} attached", kind);
        }
        token
    }

    /// Revoke the publish right; safe to call repeatedly
    pub fn detach(&self) -> Option<ProducerKind> {
        let previous = self.producer.lock().take();
        if let Some(token) = previous {
            debug!("Producer {:?} detached", token.kind);
        }
        previous.map(|t| t.kind)
    }

    /// Detach only if `token` is still the attached producer
    pub fn detach_if_current(&self, token: &ProducerToken) -> bool {
        let producer = self.producer.lock();
        if producer.get() == Some(*token) {
            producer.set(None);
            debug!("Producer {:?} detached itself", token.kind);
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, token: &ProducerToken) -> bool {
        self.producer.lock().get() == Some(*token)
    }

    pub fn active_producer(&self) -> Option<ProducerKind> {
        self.producer.lock().get().map(|t| t.kind)
    }

    /// Publish on behalf of a producer; dropped if the producer is detached.
    /// Returns `true` if the frame reached a consumer.
    pub fn publish_from(&self, token: &ProducerToken, frame: &LandmarkFrame) -> bool {
        let producer = self.producer.lock();
        if producer.get() != Some(*token) {
            self.stale.fetch_add(1, Ordering::Relaxed);
            trace!("Dropping frame from detached producer {:?}", token.kind);
            return false;
        }
        self.publish(frame)
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            unconsumed: self.unconsumed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}

impl Default for FramePublisher {
    fn default() -> Self {
        Self::new()
    }
}
