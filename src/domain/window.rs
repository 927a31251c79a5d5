//! Dual-window rate limiting state machine.
//!
//! Each `(identity, channel)` key owns one [`RateLimitEntry`]. A request is
//! judged against two overlapping windows:
//!
//! - the **steady window** (`window_ms`): once it has fully elapsed since the
//!   entry was opened, the entry is reset and the request is allowed
//! - the **burst window** (`burst_window_ms`): while the steady window is
//!   still open, up to `burst_limit` requests are allowed; the sender then
//!   waits until the burst window closes
//!
//! Steady expiry always wins over burst accounting, so a sender in a burst
//! cooldown may post again as soon as `window_ms` has passed.
//!
//! Without a burst window the entry behaves as a plain fixed window capped at
//! `max_requests`.

use crate::domain::error::ConfigError;
use crate::domain::reason::RejectionReason;
use serde::{Deserialize, Serialize};

/// Entry table key: a sender on one channel.
///
/// Keys are never shared across channels, so a sender limited on one channel
/// keeps a full allowance everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// Session token of the sender
    pub identity: String,
    /// Conversation partition
    pub channel: String,
}

impl RateLimitKey {
    /// Build a key from its parts.
    pub fn new(identity: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            channel: channel.into(),
        }
    }
}

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Requests admitted since `window_start_ms`
    pub count: u32,
    /// When the current window opened (ms since the Unix epoch)
    pub window_start_ms: u64,
}

impl RateLimitEntry {
    /// A window opened by a single request at `now_ms`.
    pub fn opened_at(now_ms: u64) -> Self {
        Self {
            count: 1,
            window_start_ms: now_ms,
        }
    }

    /// Whether the entry has been idle longer than `bound_ms`.
    pub fn is_stale(&self, now_ms: u64, bound_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start_ms) > bound_ms
    }
}

/// Burst window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstWindow {
    /// Requests allowed while the steady window is open
    pub limit: u32,
    /// How long the burst allowance lasts (ms)
    pub window_ms: u64,
}

/// Limits applied by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOptions {
    max_requests: u32,
    window_ms: u64,
    burst: Option<BurstWindow>,
}

impl RateLimitOptions {
    /// Default steady window cap.
    pub const DEFAULT_MAX_REQUESTS: u32 = 1;
    /// Default steady window (30 seconds).
    pub const DEFAULT_WINDOW_MS: u64 = 30_000;
    /// Default burst cap.
    pub const DEFAULT_BURST_LIMIT: u32 = 3;
    /// Default burst window (2 minutes).
    pub const DEFAULT_BURST_WINDOW_MS: u64 = 120_000;

    /// Start from the defaults and override individual limits.
    pub fn builder() -> RateLimitOptionsBuilder {
        RateLimitOptionsBuilder::default()
    }

    /// Plain fixed-window limiting without a burst allowance.
    ///
    /// # Errors
    /// Returns `ConfigError` if either value is zero.
    pub fn fixed_window(max_requests: u32, window_ms: u64) -> Result<Self, ConfigError> {
        Self::builder()
            .max_requests(max_requests)
            .window_ms(window_ms)
            .without_burst()
            .build()
    }

    /// Steady window cap.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Steady window length (ms).
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Burst settings, if burst limiting is enabled.
    pub fn burst(&self) -> Option<BurstWindow> {
        self.burst
    }

    /// Largest `count` an entry can reach under these options.
    pub fn max_count(&self) -> u32 {
        match self.burst {
            Some(burst) => self.max_requests.max(burst.limit),
            None => self.max_requests,
        }
    }
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            max_requests: Self::DEFAULT_MAX_REQUESTS,
            window_ms: Self::DEFAULT_WINDOW_MS,
            burst: Some(BurstWindow {
                limit: Self::DEFAULT_BURST_LIMIT,
                window_ms: Self::DEFAULT_BURST_WINDOW_MS,
            }),
        }
    }
}

/// Builder for [`RateLimitOptions`].
///
/// Burst limiting is enabled only when both the burst limit and the burst
/// window are present.
#[derive(Debug, Clone)]
pub struct RateLimitOptionsBuilder {
    max_requests: u32,
    window_ms: u64,
    burst_limit: Option<u32>,
    burst_window_ms: Option<u64>,
}

impl Default for RateLimitOptionsBuilder {
    fn default() -> Self {
        Self {
            max_requests: RateLimitOptions::DEFAULT_MAX_REQUESTS,
            window_ms: RateLimitOptions::DEFAULT_WINDOW_MS,
            burst_limit: Some(RateLimitOptions::DEFAULT_BURST_LIMIT),
            burst_window_ms: Some(RateLimitOptions::DEFAULT_BURST_WINDOW_MS),
        }
    }
}

impl RateLimitOptionsBuilder {
    /// Set the steady window cap.
    pub fn max_requests(mut self, value: u32) -> Self {
        self.max_requests = value;
        self
    }

    /// Set the steady window length (ms).
    pub fn window_ms(mut self, value: u64) -> Self {
        self.window_ms = value;
        self
    }

    /// Set (or clear) the burst cap.
    pub fn burst_limit(mut self, value: impl Into<Option<u32>>) -> Self {
        self.burst_limit = value.into();
        self
    }

    /// Set (or clear) the burst window length (ms).
    pub fn burst_window_ms(mut self, value: impl Into<Option<u64>>) -> Self {
        self.burst_window_ms = value.into();
        self
    }

    /// Disable burst limiting.
    pub fn without_burst(mut self) -> Self {
        self.burst_limit = None;
        self.burst_window_ms = None;
        self
    }

    /// Validate and freeze the options.
    ///
    /// # Errors
    /// Returns `ConfigError` if a cap or window is zero.
    pub fn build(self) -> Result<RateLimitOptions, ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if self.window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        let burst = match (self.burst_limit, self.burst_window_ms) {
            (Some(0), Some(_)) => return Err(ConfigError::ZeroBurstLimit),
            (Some(_), Some(0)) => return Err(ConfigError::ZeroBurstWindow),
            (Some(limit), Some(window_ms)) => Some(BurstWindow { limit, window_ms }),
            _ => None,
        };
        Ok(RateLimitOptions {
            max_requests: self.max_requests,
            window_ms: self.window_ms,
            burst,
        })
    }
}

/// Result of one check-and-consume step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Requests left in the governing window
    pub remaining: u32,
    /// When the governing window closes (ms since the Unix epoch)
    pub reset_time_ms: u64,
    /// Set when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    /// Whole seconds until the sender may retry, set when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    fn allow(remaining: u32, reset_time_ms: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_time_ms,
            reason: None,
            retry_after_secs: None,
        }
    }

    fn deny(reset_time_ms: u64, now_ms: u64) -> Self {
        let wait_ms = reset_time_ms.saturating_sub(now_ms);
        Self {
            allowed: false,
            remaining: 0,
            reset_time_ms,
            reason: Some(RejectionReason::RateLimited),
            retry_after_secs: Some(wait_ms.div_ceil(1000)),
        }
    }
}

/// Judge one request against the entry in `slot`, updating it in place.
///
/// `slot` is `None` when the key has never been seen (or was swept).
pub fn check_and_consume(
    slot: &mut Option<RateLimitEntry>,
    now_ms: u64,
    options: &RateLimitOptions,
) -> RateLimitDecision {
    if let Some(entry) = slot
        .as_mut()
        .filter(|entry| !entry.is_stale(now_ms, options.window_ms))
    {
        let (cap, horizon_ms) = match options.burst {
            Some(burst) => (burst.limit, burst.window_ms),
            None => (options.max_requests, options.window_ms),
        };
        let reset_time_ms = entry.window_start_ms.saturating_add(horizon_ms);

        return if entry.count < cap {
            entry.count += 1;
            RateLimitDecision::allow(cap - entry.count, reset_time_ms)
        } else {
            RateLimitDecision::deny(reset_time_ms, now_ms)
        };
    }

    // Unknown key, or the steady window has fully elapsed
    *slot = Some(RateLimitEntry::opened_at(now_ms));
    RateLimitDecision::allow(
        options.max_requests - 1,
        now_ms.saturating_add(options.window_ms),
    )
}
