//! Per-invocation pipeline configuration.
//!
//! [`PipelineOptions`] is a fully populated value object: every default is
//! applied once, at construction, so the pipeline never has to fall back to
//! defaults at a call site.
//!
//! Options can also be read from JSON. Keys are camelCase, every key is
//! optional and missing keys take their default. Inside `rateLimit`, an
//! explicit `null` for `burstLimit` or `burstWindowMs` switches burst
//! limiting off:
//!
//! ```
//! use abuse_gate::PipelineOptions;
//!
//! let options: PipelineOptions = serde_json::from_str(
//!     r#"{ "maxLength": 500, "rateLimit": { "maxRequests": 2, "burstLimit": null } }"#,
//! ).unwrap();
//!
//! assert_eq!(options.validation().max_length(), 500);
//! assert_eq!(options.rate_limit().max_requests(), 2);
//! assert!(options.rate_limit().burst().is_none());
//! ```

use crate::domain::error::ConfigError;
use crate::domain::honeypot::DEFAULT_HONEYPOT_FIELD;
use crate::domain::validator::ValidationOptions;
use crate::domain::window::RateLimitOptions;
use serde::{Deserialize, Deserializer};

/// Everything one `process_message` call needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPipelineOptions")]
pub struct PipelineOptions {
    validation: ValidationOptions,
    honeypot_field_name: String,
    rate_limit: RateLimitOptions,
}

impl PipelineOptions {
    /// Start from the defaults.
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    /// Content thresholds.
    pub fn validation(&self) -> &ValidationOptions {
        &self.validation
    }

    /// Body key holding the honeypot value.
    pub fn honeypot_field_name(&self) -> &str {
        &self.honeypot_field_name
    }

    /// Window limits.
    pub fn rate_limit(&self) -> &RateLimitOptions {
        &self.rate_limit
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            validation: ValidationOptions::strict(),
            honeypot_field_name: DEFAULT_HONEYPOT_FIELD.to_string(),
            rate_limit: RateLimitOptions::default(),
        }
    }
}

/// Builder for [`PipelineOptions`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    /// Use these content thresholds.
    pub fn validation(mut self, validation: ValidationOptions) -> Self {
        self.options.validation = validation;
        self
    }

    /// Use this honeypot key.
    pub fn honeypot_field_name(mut self, name: impl Into<String>) -> Self {
        self.options.honeypot_field_name = name.into();
        self
    }

    /// Use these window limits.
    pub fn rate_limit(mut self, rate_limit: RateLimitOptions) -> Self {
        self.options.rate_limit = rate_limit;
        self
    }

    /// Validate and freeze the options.
    ///
    /// # Errors
    /// Returns `ConfigError::EmptyHoneypotField` for a blank honeypot key.
    pub fn build(self) -> Result<PipelineOptions, ConfigError> {
        if self.options.honeypot_field_name.trim().is_empty() {
            return Err(ConfigError::EmptyHoneypotField);
        }
        Ok(self.options)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawPipelineOptions {
    min_length: Option<usize>,
    max_length: Option<usize>,
    max_line_breaks: Option<usize>,
    max_repetition_percentage: Option<u8>,
    max_char_run: Option<usize>,
    min_lines_length: Option<usize>,
    max_short_lines: Option<usize>,
    honeypot_field_name: Option<String>,
    rate_limit: Option<RawRateLimit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRateLimit {
    max_requests: Option<u32>,
    window_ms: Option<u64>,
    #[serde(default, deserialize_with = "present")]
    burst_limit: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    burst_window_ms: Option<Option<u64>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TryFrom<RawPipelineOptions> for PipelineOptions {
    type Error = ConfigError;

    fn try_from(raw: RawPipelineOptions) -> Result<Self, Self::Error> {
        let mut validation = ValidationOptions::builder();
        if let Some(v) = raw.min_length {
            validation = validation.min_length(v);
        }
        if let Some(v) = raw.max_length {
            validation = validation.max_length(v);
        }
        if let Some(v) = raw.max_line_breaks {
            validation = validation.max_line_breaks(v);
        }
        if let Some(v) = raw.max_repetition_percentage {
            validation = validation.max_repetition_percentage(v);
        }
        if let Some(v) = raw.max_char_run {
            validation = validation.max_char_run(v);
        }
        if let Some(v) = raw.min_lines_length {
            validation = validation.min_lines_length(v);
        }
        if let Some(v) = raw.max_short_lines {
            validation = validation.max_short_lines(v);
        }

        let rate = raw.rate_limit.unwrap_or_default();
        let mut rate_limit = RateLimitOptions::builder();
        if let Some(v) = rate.max_requests {
            rate_limit = rate_limit.max_requests(v);
        }
        if let Some(v) = rate.window_ms {
            rate_limit = rate_limit.window_ms(v);
        }
        if let Some(v) = rate.burst_limit {
            rate_limit = rate_limit.burst_limit(v);
        }
        if let Some(v) = rate.burst_window_ms {
            rate_limit = rate_limit.burst_window_ms(v);
        }

        let mut builder = PipelineOptions::builder()
            .validation(validation.build()?)
            .rate_limit(rate_limit.build()?);
        if let Some(name) = raw.honeypot_field_name {
            builder = builder.honeypot_field_name(name);
        }
        builder.build()
    }
}
