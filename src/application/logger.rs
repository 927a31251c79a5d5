//! Fire-and-forget moderation logging.
//!
//! Every refusal is mirrored to a [`ModerationSink`] as a redacted
//! [`ModerationEvent`]. Delivery never blocks or fails the admission
//! decision. Detached loggers hand events to a bounded queue drained by a
//! dedicated worker thread, so a sink doing blocking I/O never stalls an
//! async runtime; when the queue is full the event is dropped and counted.
//! Transport failures are counted, logged at `warn` and swallowed. Repeated
//! failures trip a [`CircuitBreaker`] so a dead transport is not called for
//! every message.

use crate::application::circuit_breaker::CircuitBreaker;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, ModerationSink};
use crate::domain::moderation::ModerationEvent;
use crate::domain::reason::ModerationReason;
use std::panic;
use std::sync::Arc;
use tracing::warn;

#[cfg(feature = "async")]
use std::thread;
#[cfg(feature = "async")]
use tokio::sync::mpsc::{self, error::TrySendError};
#[cfg(feature = "async")]
use tokio::sync::oneshot;

/// Events buffered for the detached worker before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Delivery {
    sink: Arc<dyn ModerationSink>,
    breaker: Arc<CircuitBreaker>,
    metrics: Metrics,
}

impl Delivery {
    fn deliver(&self, event: &ModerationEvent) {
        if !self.breaker.allow_request() {
            self.metrics.record_moderation_dropped();
            return;
        }

        // A panicking transport counts as a failed delivery
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| self.sink.emit(event)));

        match result {
            Ok(Ok(())) => {
                self.breaker.record_success();
                self.metrics.record_moderation_emitted();
            }
            Ok(Err(error)) => {
                self.breaker.record_failure();
                self.metrics.record_moderation_dropped();
                warn!(
                    target: "abuse_gate::moderation",
                    %error,
                    reason = %event.reason(),
                    "moderation sink failed, event dropped"
                );
            }
            Err(_) => {
                self.breaker.record_failure();
                self.metrics.record_moderation_dropped();
                warn!(
                    target: "abuse_gate::moderation",
                    reason = %event.reason(),
                    "moderation sink panicked, event dropped"
                );
            }
        }
    }
}

#[cfg(feature = "async")]
#[derive(Debug)]
enum Command {
    Event(ModerationEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
enum Dispatch {
    Inline,
    #[cfg(feature = "async")]
    Queued(mpsc::Sender<Command>),
}

/// Redacts refusals and hands them to the moderation transport.
///
/// Cloning is cheap; clones share the transport, the breaker and (when
/// queued) the worker thread.
#[derive(Debug, Clone)]
pub struct ModerationLogger {
    delivery: Arc<Delivery>,
    clock: Arc<dyn Clock>,
    dispatch: Dispatch,
}

impl ModerationLogger {
    /// Deliver events on the calling thread.
    pub fn inline(
        sink: Arc<dyn ModerationSink>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            delivery: Arc::new(Delivery {
                sink,
                breaker,
                metrics,
            }),
            clock,
            dispatch: Dispatch::Inline,
        }
    }

    /// Deliver events from a dedicated worker thread.
    ///
    /// At most `capacity` events wait in the queue (a capacity of 0 is
    /// treated as 1). Falls back to inline delivery if the thread cannot be
    /// spawned.
    #[cfg(feature = "async")]
    pub fn detached(
        sink: Arc<dyn ModerationSink>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        capacity: usize,
    ) -> Self {
        let mut logger = Self::inline(sink, breaker, clock, metrics);

        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
        let delivery = Arc::clone(&logger.delivery);
        let spawned = thread::Builder::new()
            .name("abuse-gate-moderation".to_string())
            .spawn(move || {
                // Exits once every logger clone is gone
                while let Some(command) = rx.blocking_recv() {
                    match command {
                        Command::Event(event) => delivery.deliver(&event),
                        Command::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });

        match spawned {
            Ok(_) => logger.dispatch = Dispatch::Queued(tx),
            Err(error) => warn!(
                target: "abuse_gate::moderation",
                %error,
                "could not start moderation worker, delivering inline"
            ),
        }
        logger
    }

    /// Record one refusal. Never blocks on the transport and never fails.
    pub fn record(&self, channel: &str, text: &str, reason: ModerationReason, identity: &str) {
        let event =
            ModerationEvent::redacted(channel, text, reason, identity, self.clock.now_ms());

        match &self.dispatch {
            Dispatch::Inline => self.delivery.deliver(&event),
            #[cfg(feature = "async")]
            Dispatch::Queued(tx) => match tx.try_send(Command::Event(event)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.delivery.metrics.record_moderation_dropped();
                    warn!(
                        target: "abuse_gate::moderation",
                        reason = %reason,
                        "moderation queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    self.delivery.metrics.record_moderation_dropped();
                    warn!(
                        target: "abuse_gate::moderation",
                        "moderation worker stopped, event dropped"
                    );
                }
            },
        }
    }

    /// Wait until every event recorded so far has been handed to the sink.
    ///
    /// Returns immediately for inline delivery.
    #[cfg(feature = "async")]
    pub async fn flush(&self) {
        if let Dispatch::Queued(tx) = &self.dispatch {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(Command::Flush(done_tx)).await.is_ok() {
                let _ = done_rx.await;
            }
        }
    }

    /// Blocking variant of [`ModerationLogger::flush`] for synchronous
    /// callers.
    ///
    /// # Panics
    /// Panics when called from within an async execution context.
    #[cfg(feature = "async")]
    pub fn flush_blocking(&self) {
        if let Dispatch::Queued(tx) = &self.dispatch {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.blocking_send(Command::Flush(done_tx)).is_ok() {
                let _ = done_rx.blocking_recv();
            }
        }
    }

    /// Whether events are delivered by the worker thread.
    pub fn is_detached(&self) -> bool {
        !matches!(self.dispatch, Dispatch::Inline)
    }

    /// Get a reference to the transport's circuit breaker.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.delivery.breaker
    }
}
