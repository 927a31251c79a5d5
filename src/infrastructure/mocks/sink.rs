//! Failing moderation transport for testing.

use crate::application::ports::{ModerationSink, SinkError};
use crate::domain::moderation::ModerationEvent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Sink that rejects every event, or panics when built with
/// [`FailingSink::panicking`]. Counts how often it was called.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
    panics: bool,
    healthy: AtomicBool,
}

impl FailingSink {
    /// A sink returning `SinkError::Unavailable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that panics inside `emit`.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    /// Make subsequent calls succeed (or fail again).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of times `emit` was called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ModerationSink for FailingSink {
    fn emit(&self, _event: &ModerationEvent) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.panics {
            panic!("moderation transport crashed");
        }
        Err(SinkError::Unavailable("transport offline".to_string()))
    }
}
