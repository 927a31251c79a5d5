//! Observability metrics for the abuse-prevention pipeline.
//!
//! Counts admissions, rejections per reason, swept entries and moderation
//! deliveries, for monitoring and debugging.

use crate::domain::reason::RejectionReason;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const REASONS: usize = RejectionReason::ALL.len();

/// Metrics tracking pipeline statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Messages that passed every check
    messages_accepted: AtomicU64,
    /// Rejections, indexed by `RejectionReason::index`
    rejections: [AtomicU64; REASONS],
    /// Stale entries removed by the sweep
    entries_swept: AtomicU64,
    /// Moderation events handed to the transport successfully
    moderation_emitted: AtomicU64,
    /// Moderation events lost to transport failures or an open circuit
    moderation_dropped: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                messages_accepted: AtomicU64::new(0),
                rejections: std::array::from_fn(|_| AtomicU64::new(0)),
                entries_swept: AtomicU64::new(0),
                moderation_emitted: AtomicU64::new(0),
                moderation_dropped: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.inner.messages_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, reason: RejectionReason) {
        self.inner.rejections[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swept(&self, count: usize) {
        self.inner
            .entries_swept
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_moderation_emitted(&self) {
        self.inner
            .moderation_emitted
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_moderation_dropped(&self) {
        self.inner
            .moderation_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of accepted messages.
    pub fn messages_accepted(&self) -> u64 {
        self.inner.messages_accepted.load(Ordering::Relaxed)
    }

    /// Get the number of rejections for one reason.
    pub fn rejections(&self, reason: RejectionReason) -> u64 {
        self.inner.rejections[reason.index()].load(Ordering::Relaxed)
    }

    /// Get the total number of rejections across all reasons.
    pub fn rejections_total(&self) -> u64 {
        self.inner
            .rejections
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Get the total number of swept entries.
    pub fn entries_swept(&self) -> u64 {
        self.inner.entries_swept.load(Ordering::Relaxed)
    }

    /// Get the number of moderation events delivered.
    pub fn moderation_emitted(&self) -> u64 {
        self.inner.moderation_emitted.load(Ordering::Relaxed)
    }

    /// Get the number of moderation events lost.
    pub fn moderation_dropped(&self) -> u64 {
        self.inner.moderation_dropped.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_accepted: self.messages_accepted(),
            rejections: std::array::from_fn(|i| {
                self.inner.rejections[i].load(Ordering::Relaxed)
            }),
            entries_swept: self.entries_swept(),
            moderation_emitted: self.moderation_emitted(),
            moderation_dropped: self.moderation_dropped(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.messages_accepted.store(0, Ordering::Relaxed);
        for counter in &self.inner.rejections {
            counter.store(0, Ordering::Relaxed);
        }
        self.inner.entries_swept.store(0, Ordering::Relaxed);
        self.inner.moderation_emitted.store(0, Ordering::Relaxed);
        self.inner.moderation_dropped.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages that passed every check
    pub messages_accepted: u64,
    rejections: [u64; REASONS],
    /// Stale entries removed by the sweep
    pub entries_swept: u64,
    /// Moderation events delivered
    pub moderation_emitted: u64,
    /// Moderation events lost
    pub moderation_dropped: u64,
}

impl MetricsSnapshot {
    /// Rejections recorded for one reason.
    pub fn rejections(&self, reason: RejectionReason) -> u64 {
        self.rejections[reason.index()]
    }

    /// Rejections across all reasons.
    pub fn rejections_total(&self) -> u64 {
        self.rejections.iter().sum()
    }

    /// Get the total number of messages processed (accepted + rejected).
    pub fn total_messages(&self) -> u64 {
        self.messages_accepted
            .saturating_add(self.rejections_total())
    }

    /// Calculate the rejection rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no messages have been processed.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_messages();
        if total == 0 {
            0.0
        } else {
            self.rejections_total() as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(metrics.messages_accepted(), 0);
        assert_eq!(metrics.rejections_total(), 0);
        assert_eq!(metrics.entries_swept(), 0);
        assert_eq!(metrics.moderation_emitted(), 0);
        assert_eq!(metrics.moderation_dropped(), 0);
    }

    #[test]
    fn test_rejections_are_counted_per_reason() {
        let metrics = Metrics::new();
        metrics.record_rejected(RejectionReason::TooShort);
        metrics.record_rejected(RejectionReason::TooShort);
        metrics.record_rejected(RejectionReason::RateLimited);

        assert_eq!(metrics.rejections(RejectionReason::TooShort), 2);
        assert_eq!(metrics.rejections(RejectionReason::RateLimited), 1);
        assert_eq!(metrics.rejections(RejectionReason::SpamDetected), 0);
        assert_eq!(metrics.rejections_total(), 3);
    }

    #[test]
    fn test_snapshot_rejection_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().rejection_rate(), 0.0);

        metrics.record_accepted();
        assert_eq!(metrics.snapshot().rejection_rate(), 0.0);

        metrics.record_rejected(RejectionReason::TooLong);
        assert!((metrics.snapshot().rejection_rate() - 0.5).abs() < f64::EPSILON);

        metrics.record_rejected(RejectionReason::SpamDetected);
        metrics.record_rejected(RejectionReason::SpamDetected);
        let snapshot = metrics.snapshot();
        assert!((snapshot.rejection_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(snapshot.total_messages(), 4);
        assert_eq!(snapshot.rejections(RejectionReason::SpamDetected), 2);
    }

    #[test]
    fn test_sweep_and_moderation_counters() {
        let metrics = Metrics::new();
        metrics.record_swept(7);
        metrics.record_swept(0);
        metrics.record_moderation_emitted();
        metrics.record_moderation_dropped();
        metrics.record_moderation_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_swept, 7);
        assert_eq!(snapshot.moderation_emitted, 1);
        assert_eq!(snapshot.moderation_dropped, 2);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_accepted();
        metrics.record_rejected(RejectionReason::RepetitiveContent);
        metrics.record_swept(3);

        metrics.reset();
        assert_eq!(metrics.snapshot(), Metrics::new().snapshot());
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics1 = Metrics::new();
        metrics1.record_accepted();

        let metrics2 = metrics1.clone();
        metrics2.record_accepted();

        assert_eq!(metrics1.messages_accepted(), 2);
        assert_eq!(metrics2.messages_accepted(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_accepted();
                    m.record_rejected(RejectionReason::ShortLineSpam);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.messages_accepted(), 1000);
        assert_eq!(metrics.rejections(RejectionReason::ShortLineSpam), 1000);
    }
}
