//! Log throttling
//!
//! Live capture and recording can hit the same condition on every frame
//! (a seeking source, a detector that keeps faulting). The throttler keeps
//! such messages to one per interval and key.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Limits how often the same log key is emitted
///
/// ```rust
/// use std::time::Duration;
/// use mocap_pipeline::utils::LogThrottler;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
/// assert!(throttler.should_log("timestamp_regression"));
/// assert!(!throttler.should_log("timestamp_regression"));
/// ```
pub struct LogThrottler {
    last_logged: Mutex<HashMap<String, Instant>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` if `key` has not been logged within the interval,
    /// and records the current instant for it.
    pub fn should_log(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut map = self.last_logged.lock();
        match map.get(key) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                map.insert(key.to_string(), now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last_logged.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_logged.lock().is_empty()
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled `tracing::warn!`
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}
