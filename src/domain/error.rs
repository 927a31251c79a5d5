//! Configuration errors shared by the option builders.

use thiserror::Error;

/// Returned when option values cannot form a usable configuration.
///
/// These are faults in the caller's setup, not policy outcomes, so they are
/// reported as errors instead of rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_length` must be greater than zero
    #[error("max_length must be greater than 0")]
    ZeroMaxLength,
    /// `min_length` cannot exceed `max_length`
    #[error("min_length ({min}) must not exceed max_length ({max})")]
    MinExceedsMax {
        /// Configured floor
        min: usize,
        /// Configured ceiling
        max: usize,
    },
    /// Repetition percentage must be within 1..=100
    #[error("max_repetition_percentage must be between 1 and 100, got {0}")]
    RepetitionPercentage(u8),
    /// Character run limit must be at least 1
    #[error("max_char_run must be greater than 0")]
    ZeroCharRun,
    /// Steady window cap must be at least 1
    #[error("max_requests must be greater than 0")]
    ZeroMaxRequests,
    /// Steady window must be non-empty
    #[error("window_ms must be greater than 0")]
    ZeroWindow,
    /// Burst cap must be at least 1
    #[error("burst_limit must be greater than 0")]
    ZeroBurstLimit,
    /// Burst window must be non-empty
    #[error("burst_window_ms must be greater than 0")]
    ZeroBurstWindow,
    /// Honeypot lookup key must be non-empty
    #[error("honeypot_field_name must not be empty")]
    EmptyHoneypotField,
    /// Moderation queue must hold at least one event
    #[error("moderation queue capacity must be greater than 0")]
    ZeroQueueCapacity,
    /// Sanitizer would refuse text that validation accepts
    #[error("sanitizer max_length ({sanitizer}) is below validation max_length ({validation})")]
    SanitizerCeiling {
        /// Sanitizer ceiling
        sanitizer: usize,
        /// Validation ceiling
        validation: usize,
    },
}
