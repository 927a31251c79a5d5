//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling
/// deterministic testing of window expiry and sweeping.
///
/// # Examples
///
/// ```
/// use abuse_gate::infrastructure::mocks::MockClock;
/// use abuse_gate::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new(1_700_000_000_000);
/// assert_eq!(clock.now_ms(), 1_700_000_000_000);
///
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.now_ms(), 1_700_000_030_000);
///
/// clock.set_ms(5);
/// assert_eq!(clock.now_ms(), 5);
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock starting at `start_ms` (ms since the Unix epoch).
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.advance_ms(ms);
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time. May move backwards.
    pub fn set_ms(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_mock_clock() {
        let clock = MockClock::new(100);
        assert_eq!(clock.now_ms(), 100);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now_ms(), 10_100);

        clock.set_ms(50);
        assert_eq!(clock.now_ms(), 50);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new(0);
        let clone = clock.clone();

        thread::spawn(move || clone.advance_ms(5_000))
            .join()
            .unwrap();

        assert_eq!(clock.now_ms(), 5_000);
    }
}
