//! Domain layer - pure policy with no shared state.
//!
//! This layer contains the rules of the abuse-prevention pipeline:
//! - Content heuristics and whitespace normalization
//! - The dual-window rate limiting state machine
//! - The honeypot check
//! - Rejection reasons and the message table
//! - Redacted moderation events
//!
//! Everything here is deterministic and easily testable.

pub mod error;
pub mod honeypot;
pub mod moderation;
pub mod reason;
pub mod validator;
pub mod window;
