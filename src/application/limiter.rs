//! Rate limiter coordination logic.
//!
//! The rate limiter owns the entry table (through the [`RateLimitStore`]
//! port) and runs the window state machine against it, one key at a time.

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, RateLimitStore};
use crate::domain::window::{self, RateLimitDecision, RateLimitEntry, RateLimitKey, RateLimitOptions};
use std::sync::Arc;
use tracing::debug;

/// Coordinates rate limiting decisions over an injectable store.
#[derive(Debug, Clone)]
pub struct RateLimiter<S> {
    store: S,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl<S> RateLimiter<S>
where
    S: RateLimitStore,
{
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `store` - The entry table
    /// * `clock` - Time source for window arithmetic
    /// * `metrics` - Metrics tracker (sweep counts)
    pub fn new(store: S, clock: Arc<dyn Clock>, metrics: Metrics) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    /// Judge one request from `identity` on `channel` and record it.
    ///
    /// The clock is read and the entry updated while the key is held, so
    /// concurrent calls for the same key are linearizable: under
    /// `max_requests = 1` two simultaneous requests never both pass.
    ///
    /// # Performance
    /// Hold time is one hash lookup plus constant arithmetic. No logging or
    /// I/O happens under the lock.
    pub fn check_and_consume(
        &self,
        identity: &str,
        channel: &str,
        options: &RateLimitOptions,
    ) -> RateLimitDecision {
        let key = RateLimitKey::new(identity, channel);
        self.store.with_entry(key, |slot| {
            window::check_and_consume(slot, self.clock.now_ms(), options)
        })
    }

    /// Remove every entry whose window opened more than `staleness_ms` ago.
    ///
    /// Returns the number of entries removed. A swept key behaves as a first
    /// request on its next check.
    pub fn sweep(&self, staleness_ms: u64) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0usize;
        self.store.retain(|_, entry| {
            let stale = entry.is_stale(now, staleness_ms);
            if stale {
                removed += 1;
            }
            !stale
        });

        self.metrics.record_swept(removed);
        debug!(
            removed,
            remaining = self.store.len(),
            "swept stale rate limit entries"
        );
        removed
    }

    /// Current entry for a key, if tracked.
    pub fn entry(&self, identity: &str, channel: &str) -> Option<RateLimitEntry> {
        self.store.get(&RateLimitKey::new(identity, channel))
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
