//! Process-wide admission gate for outbound model calls.
//!
//! One shared local model server backs every caller in the process, so
//! calls are serialized: a caller may proceed only once the configured
//! minimum interval has elapsed since the previous permitted call. The
//! mutex is held across the sleep, which is what enforces the gap - a
//! waiter that acquires the lock next sees the updated last-call time.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Minimum-interval gate shared by all callers.
#[derive(Debug)]
pub struct CallThrottle {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl CallThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Block until at least `min_interval` has passed since the previous
    /// permitted call, then record the new call time. Only delays, never
    /// rejects.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
