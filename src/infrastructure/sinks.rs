//! Moderation transports.
//!
//! - [`TracingSink`]: structured `tracing` events on `abuse_gate::moderation`
//! - [`JsonLinesSink`]: one JSON object per line on any writer
//! - [`MemorySink`]: keeps events in memory for inspection

use crate::application::ports::{ModerationSink, SinkError};
use crate::domain::moderation::ModerationEvent;
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Emits each event as an `INFO` tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl ModerationSink for TracingSink {
    fn emit(&self, event: &ModerationEvent) -> Result<(), SinkError> {
        info!(
            target: "abuse_gate::moderation",
            channel = event.channel(),
            truncated_text = event.truncated_text(),
            reason_code = %event.reason(),
            partial_identity = event.partial_identity(),
            timestamp = %event.timestamp_rfc3339(),
            "moderation_event"
        );
        Ok(())
    }
}

/// Writes events as JSON lines.
///
/// Each line is a complete object with `"type": "moderation_event"` and an
/// RFC 3339 timestamp. The writer is flushed after every event.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        // A panic mid-write leaves at worst a truncated line
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

impl<W: Write + Send> ModerationSink for JsonLinesSink<W> {
    fn emit(&self, event: &ModerationEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut writer = self.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ModerationEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event received so far.
    pub fn events(&self) -> Vec<ModerationEvent> {
        self.lock().clone()
    }

    /// Number of events received.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no event was received.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every event.
    pub fn drain(&self) -> Vec<ModerationEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ModerationEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModerationSink for MemorySink {
    fn emit(&self, event: &ModerationEvent) -> Result<(), SinkError> {
        self.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reason::{ModerationReason, RejectionReason};
    use crate::infrastructure::mocks::MockCaptureLayer;
    use tracing_subscriber::layer::SubscriberExt;

    fn event(reason: ModerationReason) -> ModerationEvent {
        ModerationEvent::redacted("general", "hello there", reason, "abcdefghijk", 1_700_000_000_000)
    }

    #[test]
    fn test_json_lines_format() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(&event(ModerationReason::HoneypotTriggered)).unwrap();
        sink.emit(&event(RejectionReason::TooShort.into())).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "moderation_event");
        assert_eq!(first["reasonCode"], "honeypot_triggered");
        assert_eq!(first["partialIdentity"], "abcdefgh");
        assert_eq!(first["timestamp"], "2023-11-14T22:13:20.000Z");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["reasonCode"], "too_short");
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.emit(&event(RejectionReason::RateLimited.into())).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink.events()[0].reason(),
            ModerationReason::Rejected(RejectionReason::RateLimited)
        );

        assert_eq!(sink.drain().len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_tracing_sink_emits_structured_event() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            TracingSink::new()
                .emit(&event(ModerationReason::HoneypotTriggered))
                .unwrap();
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, "abuse_gate::moderation");
        assert_eq!(events[0].field("reason_code"), Some("honeypot_triggered"));
        assert_eq!(events[0].field("partial_identity"), Some("abcdefgh"));
    }
}
