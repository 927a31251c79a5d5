//! # abuse-gate
//!
//! Abuse prevention for anonymous chat: content heuristics, dual-window rate
//! limiting, a honeypot check and a redacted moderation log, composed into a
//! single ordered decision per inbound message.
//!
//! ## Quick Start
//!
//! ```rust
//! use abuse_gate::AbusePipeline;
//!
//! let pipeline = AbusePipeline::builder().build().unwrap();
//!
//! let outcome = pipeline.process_message(
//!     "  Hello   world!  \n\n\n  How are you?  ",
//!     "session-token",
//!     "general",
//!     "", // honeypot field, empty for humans
//! );
//! assert_eq!(outcome.normalized_content(), Some("Hello world!\n\nHow are you?"));
//!
//! // Three posts per burst window by default: the fourth is refused
//! for _ in 0..2 {
//!     pipeline.process_message("Another message", "session-token", "general", "");
//! }
//! let refused = pipeline.process_message("One too many", "session-token", "general", "");
//! assert_eq!(refused.reason().map(|r| r.code()), Some("rate_limited"));
//! ```
//!
//! ## Decision Order
//!
//! Each message goes through these checks and the first failure wins:
//!
//! 1. **Honeypot**: a filled hidden field is refused as `spam_detected`
//!    (logged precisely as `honeypot_triggered`)
//! 2. **Content**: length floor and ceiling, short-line flooding, line-break
//!    ceiling, character repetition
//! 3. **Rate limit**: per `(identity, channel)` steady and burst windows
//!
//! Content checks run before the rate limiter, so a message refused on content
//! grounds never spends the sender's allowance. Every refusal is mirrored to
//! the moderation log with the text cut to 50 characters and the identity cut
//! to 8.
//!
//! ## Reason Codes
//!
//! The codes below are part of the wire contract and never change spelling:
//!
//! | Code | Recoverable by |
//! |------|----------------|
//! | `too_short` | rewording |
//! | `too_long` | rewording |
//! | `too_many_line_breaks` | rewording |
//! | `repetitive_content` | rewording |
//! | `short_line_spam` | rewording |
//! | `rate_limited` | waiting (the message states how long) |
//! | `spam_detected` | nothing; deliberately vague |
//!
//! ## Rate Limiting
//!
//! With the defaults a sender may post 3 messages within a 2 minute burst
//! window, and the entry resets once 30 seconds have passed since the window
//! opened. Without a burst window the limiter is a plain fixed window of
//! `max_requests` per `window_ms`:
//!
//! ```rust
//! use abuse_gate::{AbusePipeline, PipelineOptions, RateLimitOptions};
//!
//! let options = PipelineOptions::builder()
//!     .rate_limit(RateLimitOptions::fixed_window(1, 30_000).unwrap())
//!     .build()
//!     .unwrap();
//! let pipeline = AbusePipeline::builder().with_options(options).build().unwrap();
//!
//! assert!(pipeline.process_message("First post", "s", "general", "").is_accepted());
//! assert!(!pipeline.process_message("Second post", "s", "general", "").is_accepted());
//! // Other channels keep their own allowance
//! assert!(pipeline.process_message("First post", "s", "random", "").is_accepted());
//! ```
//!
//! Entries live in an injectable [`RateLimitStore`]; the default
//! [`ShardedStore`] is an in-memory sharded map that serializes updates per
//! key. Stale entries are only removed by a sweep, which a built pipeline
//! does not run on its own. Either let the builder start it for the
//! pipeline's lifetime, or start and stop it yourself:
//!
//! ```rust,no_run
//! # use abuse_gate::AbusePipeline;
//! # async fn example() {
//! let pipeline = AbusePipeline::builder()
//!     .with_background_sweep()
//!     .build()
//!     .unwrap();
//! # drop(pipeline);
//!
//! let pipeline = AbusePipeline::builder().build().unwrap();
//! let sweeper = pipeline.start_sweeper();
//!
//! // Serve traffic...
//!
//! sweeper.shutdown().await.expect("shutdown failed");
//! # }
//! ```
//!
//! ## Moderation Transport
//!
//! Refusals go to a [`ModerationSink`]. The default [`TracingSink`] emits an
//! `INFO` event on the `abuse_gate::moderation` target; [`JsonLinesSink`]
//! writes one JSON object per line to any writer. With the `async` feature
//! delivery happens on a dedicated worker thread behind a bounded queue, so
//! blocking I/O in a sink never stalls an async runtime. Events that find the
//! queue full are dropped and counted, and a failing transport is cut off by
//! a circuit breaker, so it can never slow down or fail an admission.
//!
//! ## Request Boundary
//!
//! [`SubmissionHandler`] maps a submission (headers plus JSON body) to a status
//! code and JSON body, reading identity from the `x-session-id` header or the
//! `sessionId` cookie and sanitizing accepted text with [`HtmlSanitizer`].

// Domain layer - pure policy
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    error::ConfigError,
    honeypot::DEFAULT_HONEYPOT_FIELD,
    moderation::ModerationEvent,
    reason::{display_message, MessageContext, ModerationReason, Rejection, RejectionReason},
    validator::{normalize, validate, ValidationOptions, ValidationOptionsBuilder, ValidationResult},
    window::{
        BurstWindow, RateLimitDecision, RateLimitEntry, RateLimitKey, RateLimitOptions,
        RateLimitOptionsBuilder,
    },
};

pub use application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
    limiter::RateLimiter,
    logger::{ModerationLogger, DEFAULT_QUEUE_CAPACITY},
    metrics::{Metrics, MetricsSnapshot},
    options::{PipelineOptions, PipelineOptionsBuilder},
    pipeline::{AbusePipeline, AbusePipelineBuilder, BuildError, PipelineOutcome},
    ports::{Clock, ModerationSink, RateLimitStore, SanitizationError, Sanitizer, SinkError},
    sweeper::{Sweeper, SweeperConfig, SweeperConfigError},
};

#[cfg(feature = "async")]
pub use application::sweeper::{ShutdownError, SweeperHandle};

pub use infrastructure::{
    boundary::{
        parse_submission, BoundaryError, BoundaryResponse, Submission, SubmissionHandler,
        SubmissionRequest,
    },
    clock::SystemClock,
    sanitizer::{HtmlSanitizer, SanitizerOptions},
    sinks::{JsonLinesSink, MemorySink, TracingSink},
    storage::ShardedStore,
};
