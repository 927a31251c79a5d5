//! Rejection reasons and their user-facing messages.
//!
//! Every component that can refuse a message reports one of the variants of
//! [`RejectionReason`]. The wire spelling of each code is stable and shared
//! with clients, so it must never change.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Why a message was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Trimmed text is shorter than the configured floor
    TooShort,
    /// Raw text is longer than the configured ceiling
    TooLong,
    /// More newline characters than allowed
    TooManyLineBreaks,
    /// A single character dominates the message
    RepetitiveContent,
    /// Many lines carrying almost no text each
    ShortLineSpam,
    /// Sender exhausted their allowance on this channel
    RateLimited,
    /// Bot signal (honeypot); deliberately vague
    SpamDetected,
}

impl RejectionReason {
    /// All reasons, in a stable order usable for indexing.
    pub const ALL: [RejectionReason; 7] = [
        RejectionReason::TooShort,
        RejectionReason::TooLong,
        RejectionReason::TooManyLineBreaks,
        RejectionReason::RepetitiveContent,
        RejectionReason::ShortLineSpam,
        RejectionReason::RateLimited,
        RejectionReason::SpamDetected,
    ];

    /// The stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::TooShort => "too_short",
            RejectionReason::TooLong => "too_long",
            RejectionReason::TooManyLineBreaks => "too_many_line_breaks",
            RejectionReason::RepetitiveContent => "repetitive_content",
            RejectionReason::ShortLineSpam => "short_line_spam",
            RejectionReason::RateLimited => "rate_limited",
            RejectionReason::SpamDetected => "spam_detected",
        }
    }

    /// Position of this reason in [`RejectionReason::ALL`].
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Whether the sender can succeed by rewording the message.
    pub fn is_content_policy(&self) -> bool {
        !matches!(
            self,
            RejectionReason::RateLimited | RejectionReason::SpamDetected
        )
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Values substituted into user-facing messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext {
    /// Length floor in effect
    pub min_length: usize,
    /// Length ceiling in effect
    pub max_length: usize,
    /// Newline ceiling in effect
    pub max_line_breaks: usize,
    /// Seconds until the sender may post again
    pub retry_after_secs: Option<u64>,
}

/// The single mapping from reason to the text shown to the sender.
pub fn display_message(reason: RejectionReason, ctx: &MessageContext) -> String {
    match reason {
        RejectionReason::TooShort => format!(
            "Message is too short. Please write at least {} characters.",
            ctx.min_length
        ),
        RejectionReason::TooLong => format!(
            "Message is too long. Please keep it to at most {} characters.",
            ctx.max_length
        ),
        RejectionReason::TooManyLineBreaks => format!(
            "Message has too many line breaks. Please use at most {}.",
            ctx.max_line_breaks
        ),
        RejectionReason::RepetitiveContent => {
            "Message contains too much repeated content.".to_string()
        }
        RejectionReason::ShortLineSpam => {
            "Message contains too many short lines. Please write complete sentences.".to_string()
        }
        RejectionReason::RateLimited => match ctx.retry_after_secs {
            Some(secs) => format!("Please wait {} seconds before posting again.", secs),
            None => "Please wait before posting again.".to_string(),
        },
        RejectionReason::SpamDetected => {
            "Your message was flagged as potential spam. Please try again later.".to_string()
        }
    }
}

/// A refused message: machine-readable code plus the text for the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Why the message was refused
    #[serde(rename = "error")]
    pub reason: RejectionReason,
    /// Human-readable explanation
    #[serde(rename = "message")]
    pub display_message: String,
}

impl Rejection {
    /// Build a rejection using the shared message table.
    pub fn new(reason: RejectionReason, ctx: &MessageContext) -> Self {
        Self {
            reason,
            display_message: display_message(reason, ctx),
        }
    }
}

/// Reason recorded on a moderation event.
///
/// Mostly mirrors [`RejectionReason`], except that honeypot hits are logged
/// precisely while the sender only ever sees `spam_detected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationReason {
    /// The hidden form field was filled in
    HoneypotTriggered,
    /// The sanitizer refused an accepted message as mostly markup
    UnsafeMarkup,
    /// Any other refusal
    Rejected(RejectionReason),
}

impl ModerationReason {
    /// Wire code for the moderation log.
    pub fn code(&self) -> &'static str {
        match self {
            ModerationReason::HoneypotTriggered => "honeypot_triggered",
            ModerationReason::UnsafeMarkup => "unsafe_markup",
            ModerationReason::Rejected(reason) => reason.code(),
        }
    }
}

impl From<RejectionReason> for ModerationReason {
    fn from(reason: RejectionReason) -> Self {
        ModerationReason::Rejected(reason)
    }
}

impl Serialize for ModerationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl fmt::Display for ModerationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
