//! Content heuristics for inbound chat messages.
//!
//! [`validate`] is a pure function: it never touches shared state and returns
//! byte-identical results for identical input. Checks run in a fixed order and
//! the first failure wins:
//!
//! 1. length floor (trimmed text)
//! 2. length ceiling (raw text)
//! 3. short-line flooding
//! 4. newline ceiling
//! 5. repetition (raw text, before any whitespace folding)
//! 6. normalization
//!
//! Short-line flooding is classified before the newline ceiling because any
//! message that floods one character per line with more than
//! `max_line_breaks` newlines would otherwise only ever be reported as
//! `too_many_line_breaks`.

use crate::domain::error::ConfigError;
use crate::domain::reason::{MessageContext, Rejection, RejectionReason};
use std::collections::HashMap;

/// Thresholds for [`validate`].
///
/// Construct with [`ValidationOptions::strict`], [`ValidationOptions::lenient`]
/// or [`ValidationOptions::builder`]. Values never change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    min_length: usize,
    max_length: usize,
    max_line_breaks: usize,
    max_repetition_percentage: u8,
    max_char_run: usize,
    min_lines_length: usize,
    max_short_lines: usize,
}

impl ValidationOptions {
    /// Default trimmed length floor.
    pub const DEFAULT_MIN_LENGTH: usize = 5;
    /// Server-side length ceiling.
    pub const STRICT_MAX_LENGTH: usize = 350;
    /// Client composer length ceiling.
    pub const LENIENT_MAX_LENGTH: usize = 500;
    /// Default newline ceiling.
    pub const DEFAULT_MAX_LINE_BREAKS: usize = 5;
    /// Default dominant-character ceiling, in percent.
    pub const DEFAULT_MAX_REPETITION_PERCENTAGE: u8 = 70;
    /// Default longest run of one repeated character.
    pub const DEFAULT_MAX_CHAR_RUN: usize = 10;
    /// Default mean line length floor for short-line detection.
    pub const DEFAULT_MIN_LINES_LENGTH: usize = 2;
    /// Default line count above which short-line detection applies.
    pub const DEFAULT_MAX_SHORT_LINES: usize = 3;

    /// Server profile (350 character ceiling).
    pub fn strict() -> Self {
        Self {
            min_length: Self::DEFAULT_MIN_LENGTH,
            max_length: Self::STRICT_MAX_LENGTH,
            max_line_breaks: Self::DEFAULT_MAX_LINE_BREAKS,
            max_repetition_percentage: Self::DEFAULT_MAX_REPETITION_PERCENTAGE,
            max_char_run: Self::DEFAULT_MAX_CHAR_RUN,
            min_lines_length: Self::DEFAULT_MIN_LINES_LENGTH,
            max_short_lines: Self::DEFAULT_MAX_SHORT_LINES,
        }
    }

    /// Client composer profile (500 character ceiling).
    pub fn lenient() -> Self {
        Self {
            max_length: Self::LENIENT_MAX_LENGTH,
            ..Self::strict()
        }
    }

    /// Start from the strict profile and override individual thresholds.
    pub fn builder() -> ValidationOptionsBuilder {
        ValidationOptionsBuilder {
            options: Self::strict(),
        }
    }

    /// Trimmed length floor.
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Raw length ceiling.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Maximum number of newline characters.
    pub fn max_line_breaks(&self) -> usize {
        self.max_line_breaks
    }

    /// Dominant-character ceiling, in percent of non-whitespace characters.
    pub fn max_repetition_percentage(&self) -> u8 {
        self.max_repetition_percentage
    }

    /// Longest allowed run of one repeated non-whitespace character.
    pub fn max_char_run(&self) -> usize {
        self.max_char_run
    }

    /// Mean line length floor for short-line detection.
    pub fn min_lines_length(&self) -> usize {
        self.min_lines_length
    }

    /// Line count above which short-line detection applies.
    pub fn max_short_lines(&self) -> usize {
        self.max_short_lines
    }

    pub(crate) fn message_context(&self) -> MessageContext {
        MessageContext {
            min_length: self.min_length,
            max_length: self.max_length,
            max_line_breaks: self.max_line_breaks,
            retry_after_secs: None,
        }
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::strict()
    }
}

/// Builder for [`ValidationOptions`].
#[derive(Debug, Clone)]
pub struct ValidationOptionsBuilder {
    options: ValidationOptions,
}

impl ValidationOptionsBuilder {
    /// Set the trimmed length floor.
    pub fn min_length(mut self, value: usize) -> Self {
        self.options.min_length = value;
        self
    }

    /// Set the raw length ceiling.
    pub fn max_length(mut self, value: usize) -> Self {
        self.options.max_length = value;
        self
    }

    /// Set the newline ceiling.
    pub fn max_line_breaks(mut self, value: usize) -> Self {
        self.options.max_line_breaks = value;
        self
    }

    /// Set the dominant-character ceiling (percent).
    pub fn max_repetition_percentage(mut self, value: u8) -> Self {
        self.options.max_repetition_percentage = value;
        self
    }

    /// Set the longest allowed character run.
    pub fn max_char_run(mut self, value: usize) -> Self {
        self.options.max_char_run = value;
        self
    }

    /// Set the mean line length floor.
    pub fn min_lines_length(mut self, value: usize) -> Self {
        self.options.min_lines_length = value;
        self
    }

    /// Set the line count above which short-line detection applies.
    pub fn max_short_lines(mut self, value: usize) -> Self {
        self.options.max_short_lines = value;
        self
    }

    /// Validate and freeze the options.
    ///
    /// # Errors
    /// Returns `ConfigError` if the thresholds contradict each other.
    pub fn build(self) -> Result<ValidationOptions, ConfigError> {
        let o = self.options;
        if o.max_length == 0 {
            return Err(ConfigError::ZeroMaxLength);
        }
        if o.min_length > o.max_length {
            return Err(ConfigError::MinExceedsMax {
                min: o.min_length,
                max: o.max_length,
            });
        }
        if o.max_repetition_percentage == 0 || o.max_repetition_percentage > 100 {
            return Err(ConfigError::RepetitionPercentage(
                o.max_repetition_percentage,
            ));
        }
        if o.max_char_run == 0 {
            return Err(ConfigError::ZeroCharRun);
        }
        Ok(o)
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The message passed; carries the normalized text
    Accepted(String),
    /// The message failed a check
    Rejected(Rejection),
}

impl ValidationResult {
    /// Check if the message was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted(_))
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            ValidationResult::Accepted(_) => None,
            ValidationResult::Rejected(rejection) => Some(rejection.reason),
        }
    }

    /// The normalized text, if accepted.
    pub fn normalized(&self) -> Option<&str> {
        match self {
            ValidationResult::Accepted(text) => Some(text),
            ValidationResult::Rejected(_) => None,
        }
    }
}

/// Run every content check against `text`.
pub fn validate(text: &str, options: &ValidationOptions) -> ValidationResult {
    match first_violation(text, options) {
        Some(reason) => {
            ValidationResult::Rejected(Rejection::new(reason, &options.message_context()))
        }
        None => ValidationResult::Accepted(normalize(text)),
    }
}

fn first_violation(text: &str, options: &ValidationOptions) -> Option<RejectionReason> {
    if text.trim().chars().count() < options.min_length {
        return Some(RejectionReason::TooShort);
    }
    if text.chars().count() > options.max_length {
        return Some(RejectionReason::TooLong);
    }
    if is_short_line_spam(text, options) {
        return Some(RejectionReason::ShortLineSpam);
    }
    if text.matches('\n').count() > options.max_line_breaks {
        return Some(RejectionReason::TooManyLineBreaks);
    }
    if is_repetitive(text, options) {
        return Some(RejectionReason::RepetitiveContent);
    }
    None
}

fn is_short_line_spam(text: &str, options: &ValidationOptions) -> bool {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= options.max_short_lines {
        return false;
    }
    let total: usize = lines.iter().map(|line| line.trim().chars().count()).sum();
    // mean < floor, without floating point
    total < options.min_lines_length * lines.len()
}

fn is_repetitive(text: &str, options: &ValidationOptions) -> bool {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut significant = 0usize;
    let mut longest_run = 0usize;
    let mut run = 0usize;
    let mut previous: Option<char> = None;

    for ch in text.chars() {
        if ch.is_whitespace() {
            previous = None;
            run = 0;
            continue;
        }
        significant += 1;
        *counts.entry(ch).or_insert(0) += 1;
        run = if previous == Some(ch) { run + 1 } else { 1 };
        longest_run = longest_run.max(run);
        previous = Some(ch);
    }

    if significant == 0 {
        return false;
    }
    if longest_run > options.max_char_run {
        return true;
    }
    let dominant = counts.values().copied().max().unwrap_or(0);
    dominant * 100 > usize::from(options.max_repetition_percentage) * significant
}

/// Fold whitespace while keeping paragraph breaks.
///
/// Runs of horizontal whitespace become one space, every line is trimmed,
/// three or more consecutive newlines become exactly two, and the result is
/// trimmed. Applying it twice yields the same text.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let folded = unified
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(folded.len());
    let mut newlines = 0usize;
    for ch in folded.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}
