//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Entry storage (sharded map)
//! - Moderation transports (tracing, JSON lines, memory)
//! - HTML sanitization
//! - The request boundary

pub mod boundary;
pub mod clock;
pub mod sanitizer;
pub mod sinks;
pub mod storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for time,
/// tracing output and failing transports.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// abuse-gate = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
