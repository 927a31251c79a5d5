//! Background garbage collection of rate limit entries.
//!
//! Periodically removes entries whose window opened longer ago than the
//! staleness bound, keeping memory bounded regardless of how many distinct
//! senders have been seen.

use crate::application::limiter::RateLimiter;
use crate::application::ports::RateLimitStore;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "async")]
use tokio::{sync::oneshot, task::JoinHandle, time::interval};
#[cfg(feature = "async")]
use tracing::debug;

/// Error returned when sweeper configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweeperConfigError {
    /// Sweep interval must be greater than zero
    #[error("sweep interval must be greater than 0")]
    ZeroInterval,
    /// Staleness bound must be greater than zero
    #[error("staleness bound must be greater than 0")]
    ZeroStaleness,
}

/// Configuration for the background sweep.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Entries idle longer than this are removed
    pub staleness: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            staleness: Duration::from_secs(5 * 60),
        }
    }
}

impl SweeperConfig {
    /// Create a sweeper config.
    ///
    /// # Errors
    /// Returns `SweeperConfigError` if either duration is zero.
    pub fn new(interval: Duration, staleness: Duration) -> Result<Self, SweeperConfigError> {
        if interval.is_zero() {
            return Err(SweeperConfigError::ZeroInterval);
        }
        if staleness.is_zero() {
            return Err(SweeperConfigError::ZeroStaleness);
        }
        Ok(Self {
            interval,
            staleness,
        })
    }

    /// Staleness bound in milliseconds.
    pub fn staleness_ms(&self) -> u64 {
        u64::try_from(self.staleness.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Error returned when the sweeper task fails to stop cleanly.
#[cfg(feature = "async")]
#[derive(Debug, Error)]
#[error("sweeper task failed to shut down: {0}")]
pub struct ShutdownError(#[from] tokio::task::JoinError);

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task, at its next wake-up.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[cfg(feature = "async")]
impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the task panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        // The task may already have exited; a closed channel is fine
        let _ = self.shutdown_tx.send(());
        self.task.await?;
        Ok(())
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Periodically sweeps a rate limiter's entry table.
#[derive(Debug)]
pub struct Sweeper<S> {
    limiter: RateLimiter<S>,
    config: SweeperConfig,
}

impl<S> Sweeper<S>
where
    S: RateLimitStore,
{
    /// Create a new sweeper.
    pub fn new(limiter: RateLimiter<S>, config: SweeperConfig) -> Self {
        Self { limiter, config }
    }

    /// Run one sweep now. Returns the number of entries removed.
    pub fn sweep_once(&self) -> usize {
        self.limiter.sweep(self.config.staleness_ms())
    }

    /// Start sweeping periodically in a background task.
    ///
    /// The first sweep happens one full interval after start. Must be called
    /// from within a Tokio runtime.
    #[cfg(feature = "async")]
    pub fn start(self) -> SweeperHandle
    where
        S: 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }

    /// Get the sweeper configuration.
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Get a reference to the limiter.
    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metrics::Metrics;
    use crate::domain::window::RateLimitOptions;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedStore;
    use std::sync::Arc;

    const T0: u64 = 1_700_000_000_000;

    fn limiter(clock: &MockClock) -> RateLimiter<Arc<ShardedStore>> {
        RateLimiter::new(
            Arc::new(ShardedStore::new()),
            Arc::new(clock.clone()),
            Metrics::new(),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.staleness_ms(), 300_000);
    }

    #[test]
    fn test_config_zero_values() {
        assert_eq!(
            SweeperConfig::new(Duration::ZERO, Duration::from_secs(1)).unwrap_err(),
            SweeperConfigError::ZeroInterval
        );
        assert_eq!(
            SweeperConfig::new(Duration::from_secs(1), Duration::ZERO).unwrap_err(),
            SweeperConfigError::ZeroStaleness
        );
    }

    #[test]
    fn test_sweep_once() {
        let clock = MockClock::new(T0);
        let limiter = limiter(&clock);
        limiter.check_and_consume("s1", "general", &RateLimitOptions::default());

        let sweeper = Sweeper::new(limiter, SweeperConfig::default());
        assert_eq!(sweeper.sweep_once(), 0);

        clock.advance_ms(300_001);
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(sweeper.limiter().is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_and_shutdown() {
        let clock = MockClock::new(T0);
        let limiter = limiter(&clock);
        limiter.check_and_consume("s1", "general", &RateLimitOptions::default());

        let handle = Sweeper::new(limiter.clone(), SweeperConfig::default()).start();

        clock.advance_ms(300_001);
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert!(limiter.entry("s1", "general").is_none());
        assert_eq!(limiter.metrics().entries_swept(), 1);

        handle.shutdown().await.expect("shutdown failed");
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_before_first_interval() {
        let clock = MockClock::new(T0);
        let limiter = limiter(&clock);
        limiter.check_and_consume("s1", "general", &RateLimitOptions::default());
        clock.advance_ms(300_001);

        let handle = Sweeper::new(limiter.clone(), SweeperConfig::default()).start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(limiter.entry("s1", "general").is_some());
        handle.shutdown().await.expect("shutdown failed");
    }
}
