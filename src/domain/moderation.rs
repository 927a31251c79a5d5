//! Redacted moderation events.
//!
//! A moderation event is the only record kept of a refused message. It
//! carries just enough to spot abuse patterns: the first 50 characters of the
//! text and the first 8 characters of the session token.

use crate::domain::reason::ModerationReason;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Longest text excerpt kept, in characters (before the ellipsis).
pub const MAX_EXCERPT_CHARS: usize = 50;
/// Longest identity prefix kept, in characters.
pub const MAX_IDENTITY_CHARS: usize = 8;
/// Marker appended to truncated excerpts.
pub const ELLIPSIS: &str = "...";

/// A write-once record of one refusal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationEvent {
    /// Always `"moderation_event"`
    #[serde(rename = "type")]
    kind: &'static str,
    /// Channel the message was posted to
    channel: String,
    /// At most 50 characters of the message, plus an ellipsis if cut
    truncated_text: String,
    /// Wire code of the refusal
    reason_code: ModerationReason,
    /// At most 8 characters of the session token
    partial_identity: String,
    /// When the event was recorded
    #[serde(rename = "timestamp", serialize_with = "serialize_rfc3339")]
    timestamp_ms: u64,
}

impl ModerationEvent {
    /// Build a redacted event. Redaction happens here so no unredacted event
    /// can ever be constructed.
    pub fn redacted(
        channel: &str,
        text: &str,
        reason: ModerationReason,
        identity: &str,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            kind: "moderation_event",
            channel: channel.to_string(),
            truncated_text: truncate_text(text),
            reason_code: reason,
            partial_identity: identity.chars().take(MAX_IDENTITY_CHARS).collect(),
            timestamp_ms,
        }
    }

    /// Channel the message was posted to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Redacted excerpt of the message.
    pub fn truncated_text(&self) -> &str {
        &self.truncated_text
    }

    /// Why the message was refused.
    pub fn reason(&self) -> ModerationReason {
        self.reason_code
    }

    /// Identity prefix.
    pub fn partial_identity(&self) -> &str {
        &self.partial_identity
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// RFC 3339 rendering of the timestamp.
    pub fn timestamp_rfc3339(&self) -> String {
        format_rfc3339(self.timestamp_ms)
    }
}

fn truncate_text(text: &str) -> String {
    let mut chars = text.chars();
    let excerpt: String = chars.by_ref().take(MAX_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}{}", excerpt, ELLIPSIS)
    } else {
        excerpt
    }
}

fn format_rfc3339(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn serialize_rfc3339<S: Serializer>(timestamp_ms: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_rfc3339(*timestamp_ms))
}
