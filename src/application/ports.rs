//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::moderation::ModerationEvent;
use crate::domain::window::{RateLimitEntry, RateLimitKey};
use std::fmt::Debug;
use thiserror::Error;

/// Port for obtaining current time.
///
/// Time is wall-clock milliseconds since the Unix epoch so that window
/// boundaries can be reported to clients as absolute reset times.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Port for the rate limiter's entry table.
///
/// Implementations must make [`RateLimitStore::with_entry`] atomic per key:
/// the closure runs while the key is held exclusively, so two concurrent
/// calls on the same key never observe the same pre-state. Calls on
/// different keys should not contend. [`RateLimitStore::retain`] must take
/// the same exclusion for every key it visits.
pub trait RateLimitStore: Send + Sync + Debug {
    /// Run `f` with exclusive access to the slot for `key`.
    ///
    /// The slot is `None` for an unknown key. Leaving it `None` after the
    /// closure returns removes the key.
    fn with_entry<F, R>(&self, key: RateLimitKey, f: F) -> R
    where
        F: FnOnce(&mut Option<RateLimitEntry>) -> R;

    /// Copy of the entry for `key`, if present.
    fn get(&self, key: &RateLimitKey) -> Option<RateLimitEntry>;

    /// Get the number of entries in the store.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    fn clear(&self);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&RateLimitKey, &RateLimitEntry) -> bool;
}

impl<T: RateLimitStore + ?Sized> RateLimitStore for std::sync::Arc<T> {
    fn with_entry<F, R>(&self, key: RateLimitKey, f: F) -> R
    where
        F: FnOnce(&mut Option<RateLimitEntry>) -> R,
    {
        (**self).with_entry(key, f)
    }

    fn get(&self, key: &RateLimitKey) -> Option<RateLimitEntry> {
        (**self).get(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&RateLimitKey, &RateLimitEntry) -> bool,
    {
        (**self).retain(f)
    }
}

/// Error reported by a moderation transport.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the underlying stream failed
    #[error("moderation sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The event could not be encoded
    #[error("moderation event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// The transport is not accepting events
    #[error("moderation sink unavailable: {0}")]
    Unavailable(String),
}

/// Port for the moderation log transport (console, store, webhook).
///
/// Called off the admission path. Failures are reported back so the logger
/// can count them and trip its circuit breaker, but they never reach the
/// sender.
pub trait ModerationSink: Send + Sync + Debug {
    /// Deliver one redacted event.
    fn emit(&self, event: &ModerationEvent) -> Result<(), SinkError>;
}

impl<T: ModerationSink + ?Sized> ModerationSink for std::sync::Arc<T> {
    fn emit(&self, event: &ModerationEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }
}

/// Why a sanitizer refused its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizationError {
    /// Input longer than the sanitizer accepts
    #[error("input exceeds maximum length of {max} characters")]
    TooLong {
        /// Configured ceiling
        max: usize,
    },
    /// Stripping removed most of the input
    #[error("input contains potentially malicious content")]
    Suspicious,
}

/// Port for turning accepted text into safe display text.
///
/// Runs after the pipeline has accepted a message. Implementations strip
/// markup and may refuse input that is mostly markup.
pub trait Sanitizer: Send + Sync + Debug {
    /// Clean `input` for display.
    fn sanitize(&self, input: &str) -> Result<String, SanitizationError>;

    /// Longest input (characters) this sanitizer accepts, if bounded.
    fn max_length(&self) -> Option<usize> {
        None
    }
}
