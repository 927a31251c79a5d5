//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Rate limiter (entry table access and sweeping)
//! - Moderation logger (redaction and detached delivery)
//! - Pipeline (the ordered admission decision)
//! - Sweeper (periodic garbage collection)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod circuit_breaker;
pub mod limiter;
pub mod logger;
pub mod metrics;
pub mod options;
pub mod pipeline;
pub mod ports;
pub mod sweeper;
