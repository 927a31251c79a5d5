//! The ordered admission procedure for one inbound message.
//!
//! Checks run cheapest first and the first failure wins:
//!
//! 1. honeypot (bot traffic never costs validation work)
//! 2. content validation (stateless, so a badly formed message never
//!    consumes rate allowance)
//! 3. rate limiting (the only step touching shared state)
//!
//! Every refusal is returned to the caller and mirrored to the moderation
//! log. Honeypot hits are logged as `honeypot_triggered` but reported to the
//! sender only as `spam_detected`.

use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::application::limiter::RateLimiter;
use crate::application::logger::{ModerationLogger, DEFAULT_QUEUE_CAPACITY};
use crate::application::metrics::Metrics;
use crate::application::options::PipelineOptions;
use crate::application::ports::{Clock, ModerationSink, RateLimitStore};
use crate::application::sweeper::{Sweeper, SweeperConfig};
use crate::domain::error::ConfigError;
use crate::domain::honeypot;
use crate::domain::reason::{MessageContext, ModerationReason, Rejection, RejectionReason};
use crate::domain::validator::{self, ValidationResult};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::sinks::TracingSink;
use crate::infrastructure::storage::ShardedStore;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(feature = "async")]
use crate::application::sweeper::SweeperHandle;

const TARGET: &str = "abuse_gate::pipeline";

/// Error returned when building a pipeline fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Option values are invalid
    #[error("invalid pipeline options: {0}")]
    Config(#[from] ConfigError),
    /// Sweeper configuration is invalid
    #[error("invalid sweeper configuration: {0}")]
    Sweeper(#[from] crate::application::sweeper::SweeperConfigError),
    /// A background sweep was requested outside a Tokio runtime
    #[error("background sweep requires a Tokio runtime")]
    NoRuntime,
}

#[cfg(feature = "async")]
type StartSweep<S> = fn(&RateLimiter<S>, &SweeperConfig) -> SweeperHandle;

/// Result of [`AbusePipeline::process_message`].
///
/// Serializes as `{"success": true, "normalizedContent": ...}` or
/// `{"success": false, "error": <code>, "message": <text>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every check passed
    Accepted {
        /// Whitespace-normalized text; the authoritative message body
        normalized_content: String,
    },
    /// A check failed
    Rejected(Rejection),
}

impl PipelineOutcome {
    /// Check if the message was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, PipelineOutcome::Accepted { .. })
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            PipelineOutcome::Accepted { .. } => None,
            PipelineOutcome::Rejected(rejection) => Some(rejection.reason),
        }
    }

    /// The normalized text, if accepted.
    pub fn normalized_content(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Accepted { normalized_content } => Some(normalized_content),
            PipelineOutcome::Rejected(_) => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            PipelineOutcome::Accepted { .. } => None,
            PipelineOutcome::Rejected(rejection) => Some(rejection),
        }
    }
}

impl Serialize for PipelineOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match self {
            PipelineOutcome::Accepted { normalized_content } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("normalizedContent", normalized_content)?;
            }
            PipelineOutcome::Rejected(rejection) => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", &rejection.reason)?;
                map.serialize_entry("message", &rejection.display_message)?;
            }
        }
        map.end()
    }
}

/// Builder for [`AbusePipeline`].
pub struct AbusePipelineBuilder<S> {
    options: PipelineOptions,
    store: S,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn ModerationSink>>,
    circuit_breaker: CircuitBreakerConfig,
    sweeper: SweeperConfig,
    detached_moderation: bool,
    queue_capacity: usize,
    #[cfg(feature = "async")]
    start_sweep: Option<StartSweep<S>>,
}

impl<S> AbusePipelineBuilder<S>
where
    S: RateLimitStore,
{
    /// Default options for every call that does not pass its own.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Send moderation events to this transport instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn ModerationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Keep rate limit entries in a different store.
    ///
    /// Clears an earlier [`with_background_sweep`](Self::with_background_sweep)
    /// request; call that after choosing the store.
    pub fn with_store<T: RateLimitStore>(self, store: T) -> AbusePipelineBuilder<T> {
        AbusePipelineBuilder {
            options: self.options,
            store,
            clock: self.clock,
            sink: self.sink,
            circuit_breaker: self.circuit_breaker,
            sweeper: self.sweeper,
            detached_moderation: self.detached_moderation,
            queue_capacity: self.queue_capacity,
            #[cfg(feature = "async")]
            start_sweep: None,
        }
    }

    /// Tune the breaker guarding the moderation transport.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Configure the background sweep.
    pub fn with_sweeper(mut self, config: SweeperConfig) -> Self {
        self.sweeper = config;
        self
    }

    /// Deliver moderation events from a background worker thread (the
    /// default with the `async` feature) or on the calling thread.
    pub fn with_detached_moderation(mut self, detached: bool) -> Self {
        self.detached_moderation = detached;
        self
    }

    /// Bound the detached moderation queue. Events recorded while it is
    /// full are dropped and counted as `moderation_dropped`.
    pub fn with_moderation_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    /// Returns `BuildError` if the options or sweeper settings are invalid,
    /// or if a background sweep was requested outside a Tokio runtime.
    pub fn build(self) -> Result<AbusePipeline<S>, BuildError> {
        if self.options.honeypot_field_name().trim().is_empty() {
            return Err(ConfigError::EmptyHoneypotField.into());
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity.into());
        }
        let sweeper = SweeperConfig::new(self.sweeper.interval, self.sweeper.staleness)?;
        #[cfg(feature = "async")]
        if self.start_sweep.is_some() && tokio::runtime::Handle::try_current().is_err() {
            return Err(BuildError::NoRuntime);
        }

        let metrics = Metrics::new();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink::new()));
        let breaker = Arc::new(CircuitBreaker::with_config(
            self.circuit_breaker,
            Arc::clone(&clock),
        ));

        let logger = if self.detached_moderation {
            detached_logger(
                sink,
                breaker,
                Arc::clone(&clock),
                metrics.clone(),
                self.queue_capacity,
            )
        } else {
            ModerationLogger::inline(sink, breaker, Arc::clone(&clock), metrics.clone())
        };

        let limiter = RateLimiter::new(self.store, clock, metrics.clone());
        #[cfg(feature = "async")]
        let background_sweep = self
            .start_sweep
            .map(|start| Arc::new(start(&limiter, &sweeper)));

        Ok(AbusePipeline {
            options: self.options,
            limiter,
            logger,
            metrics,
            sweeper,
            #[cfg(feature = "async")]
            background_sweep,
        })
    }
}

#[cfg(feature = "async")]
impl<S> AbusePipelineBuilder<S>
where
    S: RateLimitStore + Clone + 'static,
{
    /// Start the background sweep from [`build`](Self::build).
    ///
    /// The sweep runs until the last clone of the pipeline is dropped.
    /// `build` must then be called from within a Tokio runtime and returns
    /// [`BuildError::NoRuntime`] otherwise.
    pub fn with_background_sweep(mut self) -> Self {
        let start: StartSweep<S> =
            |limiter, config| Sweeper::new(limiter.clone(), config.clone()).start();
        self.start_sweep = Some(start);
        self
    }
}

#[cfg(feature = "async")]
fn detached_logger(
    sink: Arc<dyn ModerationSink>,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    capacity: usize,
) -> ModerationLogger {
    ModerationLogger::detached(sink, breaker, clock, metrics, capacity)
}

#[cfg(not(feature = "async"))]
fn detached_logger(
    sink: Arc<dyn ModerationSink>,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    _capacity: usize,
) -> ModerationLogger {
    ModerationLogger::inline(sink, breaker, clock, metrics)
}

/// The abuse-prevention pipeline.
///
/// Cheap to clone; clones share the entry table, metrics and moderation
/// transport.
#[derive(Debug, Clone)]
pub struct AbusePipeline<S = Arc<ShardedStore>> {
    options: PipelineOptions,
    limiter: RateLimiter<S>,
    logger: ModerationLogger,
    metrics: Metrics,
    sweeper: SweeperConfig,
    #[cfg(feature = "async")]
    background_sweep: Option<Arc<SweeperHandle>>,
}

impl AbusePipeline<Arc<ShardedStore>> {
    /// Create a builder with an in-memory sharded store.
    ///
    /// **The built pipeline does not sweep stale entries on its own.**
    /// Without a sweep the entry table grows with every distinct
    /// `(identity, channel)` pair. Either request it up front with
    /// [`AbusePipelineBuilder::with_background_sweep`], start it later with
    /// [`AbusePipeline::start_sweeper`], or call [`AbusePipeline::sweep`]
    /// from your own scheduler.
    ///
    /// Defaults:
    /// - Options: [`PipelineOptions::default`]
    /// - Clock: system wall clock
    /// - Moderation transport: [`TracingSink`] on a worker thread, queue of
    ///   1024 events
    /// - Sweep settings: every 5 minutes, entries older than 5 minutes
    pub fn builder() -> AbusePipelineBuilder<Arc<ShardedStore>> {
        AbusePipelineBuilder {
            options: PipelineOptions::default(),
            store: Arc::new(ShardedStore::new()),
            clock: None,
            sink: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            sweeper: SweeperConfig::default(),
            detached_moderation: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            #[cfg(feature = "async")]
            start_sweep: None,
        }
    }
}

impl<S> AbusePipeline<S>
where
    S: RateLimitStore,
{
    /// Judge one message using the pipeline's default options.
    pub fn process_message(
        &self,
        text: &str,
        identity: &str,
        channel: &str,
        honeypot_value: &str,
    ) -> PipelineOutcome {
        self.process_message_with(text, identity, channel, honeypot_value, &self.options)
    }

    /// Judge one message using per-call options.
    pub fn process_message_with(
        &self,
        text: &str,
        identity: &str,
        channel: &str,
        honeypot_value: &str,
        options: &PipelineOptions,
    ) -> PipelineOutcome {
        let context = options.validation().message_context();

        if honeypot::is_triggered(honeypot_value) {
            let rejection = Rejection::new(RejectionReason::SpamDetected, &context);
            return self.reject(
                rejection,
                ModerationReason::HoneypotTriggered,
                text,
                identity,
                channel,
            );
        }

        let normalized_content = match validator::validate(text, options.validation()) {
            ValidationResult::Accepted(normalized) => normalized,
            ValidationResult::Rejected(rejection) => {
                let reason = rejection.reason.into();
                return self.reject(rejection, reason, text, identity, channel);
            }
        };

        let decision = self
            .limiter
            .check_and_consume(identity, channel, options.rate_limit());
        if !decision.allowed {
            let reason = decision.reason.unwrap_or(RejectionReason::RateLimited);
            let context = MessageContext {
                retry_after_secs: decision.retry_after_secs,
                ..context
            };
            return self.reject(
                Rejection::new(reason, &context),
                reason.into(),
                text,
                identity,
                channel,
            );
        }

        self.metrics.record_accepted();
        debug!(
            target: TARGET,
            channel,
            remaining = decision.remaining,
            "message accepted"
        );
        PipelineOutcome::Accepted { normalized_content }
    }

    fn reject(
        &self,
        rejection: Rejection,
        moderation_reason: ModerationReason,
        text: &str,
        identity: &str,
        channel: &str,
    ) -> PipelineOutcome {
        self.metrics.record_rejected(rejection.reason);
        info!(
            target: TARGET,
            channel,
            reason = %moderation_reason,
            "message rejected"
        );
        self.logger.record(channel, text, moderation_reason, identity);
        PipelineOutcome::Rejected(rejection)
    }

    /// Run one sweep now with the configured staleness bound.
    pub fn sweep(&self) -> usize {
        self.limiter.sweep(self.sweeper.staleness_ms())
    }

    /// Start the background sweep.
    ///
    /// Must be called from within a Tokio runtime. Stop it with
    /// [`SweeperHandle::shutdown`].
    #[cfg(feature = "async")]
    pub fn start_sweeper(&self) -> SweeperHandle
    where
        S: Clone + 'static,
    {
        Sweeper::new(self.limiter.clone(), self.sweeper.clone()).start()
    }

    /// Whether a sweep was started by the builder.
    ///
    /// It stops when the last clone of this pipeline is dropped.
    #[cfg(feature = "async")]
    pub fn has_background_sweep(&self) -> bool {
        self.background_sweep.is_some()
    }

    /// Build a sweeper without starting it.
    pub fn sweeper(&self) -> Sweeper<S>
    where
        S: Clone,
    {
        Sweeper::new(self.limiter.clone(), self.sweeper.clone())
    }

    /// Wait for queued moderation events to reach the transport.
    #[cfg(feature = "async")]
    pub async fn flush_moderation(&self) {
        self.logger.flush().await;
    }

    /// Default options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Get a reference to the rate limiter.
    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }

    /// Get a reference to the moderation logger.
    pub fn logger(&self) -> &ModerationLogger {
        &self.logger
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::RateLimitOptions;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::sinks::MemorySink;

    const T0: u64 = 1_700_000_000_000;

    fn pipeline() -> (AbusePipeline, Arc<MemorySink>, MockClock) {
        let clock = MockClock::new(T0);
        let sink = Arc::new(MemorySink::new());
        let pipeline = AbusePipeline::builder()
            .with_clock(Arc::new(clock.clone()))
            .with_sink(sink.clone())
            .with_detached_moderation(false)
            .build()
            .unwrap();
        (pipeline, sink, clock)
    }

    #[test]
    fn test_accepts_and_normalizes() {
        let (pipeline, sink, _) = pipeline();
        let outcome =
            pipeline.process_message("  Hello   world!  \n\n\n  How are you?  ", "s1", "general", "");

        assert_eq!(
            outcome.normalized_content(),
            Some("Hello world!\n\nHow are you?")
        );
        assert!(sink.is_empty());
        assert_eq!(pipeline.metrics().messages_accepted(), 1);
    }

    #[test]
    fn test_honeypot_wins_over_everything() {
        let (pipeline, sink, _) = pipeline();
        // Too short as well, but the honeypot is checked first
        let outcome = pipeline.process_message("hi", "s1", "general", "http://bot");

        assert_eq!(outcome.reason(), Some(RejectionReason::SpamDetected));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason(), ModerationReason::HoneypotTriggered);
        // No rate allowance consumed
        assert!(pipeline.limiter().is_empty());
    }

    #[test]
    fn test_content_rejection_does_not_consume_allowance() {
        let (pipeline, sink, _) = pipeline();
        let options = PipelineOptions::builder()
            .rate_limit(RateLimitOptions::fixed_window(1, 30_000).unwrap())
            .build()
            .unwrap();

        let bad = pipeline.process_message_with("hey", "s1", "general", "", &options);
        assert_eq!(bad.reason(), Some(RejectionReason::TooShort));
        assert!(pipeline.limiter().entry("s1", "general").is_none());

        let good =
            pipeline.process_message_with("Hello everyone!", "s1", "general", "", &options);
        assert!(good.is_accepted());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_rate_limited_message_has_wait_time() {
        let (pipeline, sink, clock) = pipeline();
        let options = PipelineOptions::builder()
            .rate_limit(RateLimitOptions::fixed_window(1, 30_000).unwrap())
            .build()
            .unwrap();

        assert!(pipeline
            .process_message_with("First message", "s1", "general", "", &options)
            .is_accepted());
        clock.advance_ms(12_500);
        let outcome =
            pipeline.process_message_with("Second message", "s1", "general", "", &options);

        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.reason, RejectionReason::RateLimited);
        assert_eq!(
            rejection.display_message,
            "Please wait 18 seconds before posting again."
        );
        assert_eq!(
            sink.events()[0].reason(),
            ModerationReason::Rejected(RejectionReason::RateLimited)
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let accepted = PipelineOutcome::Accepted {
            normalized_content: "Hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&accepted).unwrap(),
            serde_json::json!({ "success": true, "normalizedContent": "Hello" })
        );

        let (pipeline, _, _) = pipeline();
        let rejected = pipeline.process_message("hi", "s1", "general", "");
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            serde_json::json!({
                "success": false,
                "error": "too_short",
                "message": "Message is too short. Please write at least 5 characters.",
            })
        );
    }

    #[test]
    fn test_build_rejects_bad_sweeper_config() {
        let result = AbusePipeline::builder()
            .with_sweeper(SweeperConfig {
                interval: std::time::Duration::ZERO,
                staleness: std::time::Duration::from_secs(1),
            })
            .build();
        assert!(matches!(result, Err(BuildError::Sweeper(_))));
    }

    #[test]
    fn test_build_rejects_zero_queue_capacity() {
        let result = AbusePipeline::builder()
            .with_moderation_queue_capacity(0)
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::Config(ConfigError::ZeroQueueCapacity)
        );
    }

    #[cfg(feature = "async")]
    #[test]
    fn test_background_sweep_needs_runtime() {
        let result = AbusePipeline::builder().with_background_sweep().build();
        assert_eq!(result.unwrap_err(), BuildError::NoRuntime);
    }

    #[test]
    fn test_rejections_are_counted_per_reason() {
        let (pipeline, _, _) = pipeline();
        pipeline.process_message("hi", "s1", "general", "");
        pipeline.process_message(&"x".repeat(400), "s1", "general", "");
        pipeline.process_message("Hello there", "s1", "general", "filled");

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.rejections(RejectionReason::TooShort), 1);
        assert_eq!(snapshot.rejections(RejectionReason::TooLong), 1);
        assert_eq!(snapshot.rejections(RejectionReason::SpamDetected), 1);
        assert_eq!(snapshot.moderation_emitted, 3);
    }
}
