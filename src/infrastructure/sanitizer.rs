//! HTML stripping for accepted messages.
//!
//! [`HtmlSanitizer`] cleans text in this order:
//!
//! 1. refuse input above `max_length` before doing any work
//! 2. drop control characters (tab, newline and carriage return survive)
//! 3. Unicode NFC normalization
//! 4. remove every tag and attribute with `ammonia`; text content is kept,
//!    `<script>` and `<style>` bodies are dropped, and the result is escaped
//!    HTML text
//! 5. optionally collapse whitespace runs
//! 6. refuse the result if more than half the input was stripped
//!
//! Escaped output is never cut: `&` becomes `&amp;`, so output may be longer
//! than `max_length` even though the input was not.

use crate::application::ports::{SanitizationError, Sanitizer};
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Settings for [`HtmlSanitizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizerOptions {
    /// Longest input accepted (characters)
    pub max_length: usize,
    /// Fold whitespace runs into single spaces. Off by default so paragraph
    /// breaks survive.
    pub collapse_whitespace: bool,
}

impl Default for SanitizerOptions {
    fn default() -> Self {
        Self {
            max_length: 350,
            collapse_whitespace: false,
        }
    }
}

/// Strips markup using `ammonia` with an empty allow-list.
pub struct HtmlSanitizer {
    options: SanitizerOptions,
    cleaner: ammonia::Builder<'static>,
}

impl HtmlSanitizer {
    /// Sanitizer with default options.
    pub fn new() -> Self {
        Self::with_options(SanitizerOptions::default())
    }

    /// Sanitizer with custom options.
    pub fn with_options(options: SanitizerOptions) -> Self {
        let mut cleaner = ammonia::Builder::empty();
        cleaner.clean_content_tags(HashSet::from(["script", "style"]));
        Self { options, cleaner }
    }

    /// Get the options.
    pub fn options(&self) -> &SanitizerOptions {
        &self.options
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HtmlSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlSanitizer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Sanitizer for HtmlSanitizer {
    fn sanitize(&self, input: &str) -> Result<String, SanitizationError> {
        let max = self.options.max_length;
        let original_len = input.chars().count();
        if original_len > max {
            return Err(SanitizationError::TooLong { max });
        }

        let printable: String = input
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
            .collect();
        let composed: String = printable.nfc().collect();
        let stripped = self.cleaner.clean(&composed).to_string();

        let cleaned = if self.options.collapse_whitespace {
            stripped.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            stripped
        };

        if cleaned.chars().count() * 2 < original_len {
            return Err(SanitizationError::Suspicious);
        }

        Ok(cleaned)
    }

    fn max_length(&self) -> Option<usize> {
        Some(self.options.max_length)
    }
}
