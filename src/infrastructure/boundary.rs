//! Framework-agnostic request boundary.
//!
//! Turns a submission (headers plus a JSON body) into an HTTP-style status
//! and JSON response, so any web framework can mount the pipeline with a
//! few lines of glue:
//!
//! - identity: `x-session-id` header, else the `sessionId` cookie, else
//!   `"anonymous"`
//! - `message` and `channel` must be strings, otherwise 400 `invalid_input`
//! - the honeypot value is read from the configured body field
//! - rejections: 400 `{error, message}`
//! - accepted messages are sanitized and returned as 200
//!   `{success: true, normalizedContent}`; a sanitizer refusal is a 400
//!   `invalid_input` and is mirrored to the moderation log
//! - a panic inside the pipeline becomes 500 `server_error`

use crate::application::pipeline::{AbusePipeline, PipelineOutcome};
use crate::application::ports::{RateLimitStore, SanitizationError, Sanitizer};
use crate::domain::error::ConfigError;
use crate::domain::reason::{ModerationReason, RejectionReason};
use crate::infrastructure::sanitizer::{HtmlSanitizer, SanitizerOptions};
use serde_json::{json, Value};
use std::panic;
use thiserror::Error;
use tracing::error;

/// Identity used when the request carries no session token.
pub const ANONYMOUS: &str = "anonymous";
/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-id";
/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionId";

const SERVER_ERROR_MESSAGE: &str = "An error occurred while processing your message.";

/// Why a submission never reached the pipeline, or failed after it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// Body is not a JSON object
    #[error("request body must be a JSON object")]
    NotAnObject,
    /// A required field is absent or not a string
    #[error("field `{0}` is required and must be a string")]
    InvalidField(&'static str),
    /// The sanitizer refused the accepted text
    #[error(transparent)]
    Sanitization(#[from] SanitizationError),
}

/// An inbound message submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    headers: Vec<(String, String)>,
    body: Value,
}

impl SubmissionRequest {
    /// A request with this JSON body and no headers.
    pub fn new(body: Value) -> Self {
        Self {
            headers: Vec::new(),
            body,
        }
    }

    /// Add a header. Names compare case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of a cookie from the `cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, value)| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// The session token, falling back to [`ANONYMOUS`].
    pub fn identity(&self) -> &str {
        self.header(SESSION_HEADER)
            .filter(|value| !value.is_empty())
            .or_else(|| self.cookie(SESSION_COOKIE).filter(|value| !value.is_empty()))
            .unwrap_or(ANONYMOUS)
    }

    /// The JSON body.
    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// Fields extracted from a submission body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission<'a> {
    /// Message text
    pub message: &'a str,
    /// Target channel
    pub channel: &'a str,
    /// Hidden field value, empty when absent
    pub honeypot: &'a str,
}

/// Pull the fields the pipeline needs out of a JSON body.
///
/// # Errors
/// Returns `BoundaryError` if the body is not an object or `message` /
/// `channel` are missing or not strings.
pub fn parse_submission<'a>(
    body: &'a Value,
    honeypot_field: &str,
) -> Result<Submission<'a>, BoundaryError> {
    let object = body.as_object().ok_or(BoundaryError::NotAnObject)?;
    let field = move |name: &'static str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .ok_or(BoundaryError::InvalidField(name))
    };

    Ok(Submission {
        message: field("message")?,
        channel: field("channel")?,
        honeypot: object
            .get(honeypot_field)
            .and_then(Value::as_str)
            .unwrap_or(""),
    })
}

/// Status code and JSON body to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body
    pub body: Value,
}

impl BoundaryResponse {
    fn invalid_input(error: &BoundaryError) -> Self {
        Self {
            status: 400,
            body: json!({ "error": "invalid_input", "message": error.to_string() }),
        }
    }

    fn server_error() -> Self {
        Self {
            status: 500,
            body: json!({ "error": "server_error", "message": SERVER_ERROR_MESSAGE }),
        }
    }

    /// Whether the submission was accepted.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Runs submissions through the pipeline and the sanitizer.
#[derive(Debug, Clone)]
pub struct SubmissionHandler<S, Z> {
    pipeline: AbusePipeline<S>,
    sanitizer: Z,
}

impl<S> SubmissionHandler<S, HtmlSanitizer>
where
    S: RateLimitStore,
{
    /// Handler with an [`HtmlSanitizer`] whose ceiling matches the
    /// pipeline's validation ceiling.
    pub fn with_html_sanitizer(pipeline: AbusePipeline<S>) -> Self {
        let sanitizer = HtmlSanitizer::with_options(SanitizerOptions {
            max_length: pipeline.options().validation().max_length(),
            ..SanitizerOptions::default()
        });
        Self {
            pipeline,
            sanitizer,
        }
    }
}

impl<S, Z> SubmissionHandler<S, Z>
where
    S: RateLimitStore,
    Z: Sanitizer,
{
    /// Create a handler.
    ///
    /// # Errors
    /// Returns `ConfigError::SanitizerCeiling` if the sanitizer would refuse
    /// text the pipeline's validation accepts, since such messages would
    /// consume rate allowance and then fail anyway.
    pub fn new(pipeline: AbusePipeline<S>, sanitizer: Z) -> Result<Self, ConfigError> {
        let validation = pipeline.options().validation().max_length();
        if let Some(ceiling) = sanitizer.max_length() {
            if ceiling < validation {
                return Err(ConfigError::SanitizerCeiling {
                    sanitizer: ceiling,
                    validation,
                });
            }
        }
        Ok(Self {
            pipeline,
            sanitizer,
        })
    }

    /// Handle one submission.
    pub fn handle(&self, request: &SubmissionRequest) -> BoundaryResponse {
        let honeypot_field = self.pipeline.options().honeypot_field_name();
        let submission = match parse_submission(request.body(), honeypot_field) {
            Ok(submission) => submission,
            Err(error) => return BoundaryResponse::invalid_input(&error),
        };
        let identity = request.identity();

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.pipeline.process_message(
                submission.message,
                identity,
                submission.channel,
                submission.honeypot,
            )
        }));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    target: "abuse_gate::pipeline",
                    channel = submission.channel,
                    "pipeline panicked while processing a submission"
                );
                return BoundaryResponse::server_error();
            }
        };

        match outcome {
            PipelineOutcome::Rejected(rejection) => BoundaryResponse {
                status: 400,
                body: json!({ "error": rejection.reason, "message": rejection.display_message }),
            },
            PipelineOutcome::Accepted { normalized_content } => {
                match self.sanitizer.sanitize(&normalized_content) {
                    Ok(clean) => BoundaryResponse {
                        status: 200,
                        body: json!({ "success": true, "normalizedContent": clean }),
                    },
                    Err(error) => {
                        let reason: ModerationReason = match error {
                            SanitizationError::TooLong { .. } => RejectionReason::TooLong.into(),
                            SanitizationError::Suspicious => ModerationReason::UnsafeMarkup,
                        };
                        self.pipeline.logger().record(
                            submission.channel,
                            submission.message,
                            reason,
                            identity,
                        );
                        BoundaryResponse::invalid_input(&BoundaryError::from(error))
                    }
                }
            }
        }
    }

    /// Get a reference to the pipeline.
    pub fn pipeline(&self) -> &AbusePipeline<S> {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_precedence() {
        let both = SubmissionRequest::default()
            .with_header("X-Session-Id", "from-header")
            .with_header("Cookie", "theme=dark; sessionId=from-cookie");
        assert_eq!(both.identity(), "from-header");

        let cookie_only =
            SubmissionRequest::default().with_header("cookie", "theme=dark; sessionId=from-cookie");
        assert_eq!(cookie_only.identity(), "from-cookie");

        assert_eq!(SubmissionRequest::default().identity(), ANONYMOUS);
    }

    #[test]
    fn test_parse_submission() {
        let body = json!({ "message": "hello", "channel": "general", "website": "x" });
        let submission = parse_submission(&body, "website").unwrap();
        assert_eq!(submission.message, "hello");
        assert_eq!(submission.channel, "general");
        assert_eq!(submission.honeypot, "x");

        let without_honeypot = json!({ "message": "hello", "channel": "general" });
        assert_eq!(
            parse_submission(&without_honeypot, "website").unwrap().honeypot,
            ""
        );
    }

    #[test]
    fn test_parse_submission_errors() {
        assert_eq!(
            parse_submission(&json!([1, 2]), "website"),
            Err(BoundaryError::NotAnObject)
        );
        assert_eq!(
            parse_submission(&json!({ "channel": "general" }), "website"),
            Err(BoundaryError::InvalidField("message"))
        );
        assert_eq!(
            parse_submission(&json!({ "message": "hi", "channel": 7 }), "website"),
            Err(BoundaryError::InvalidField("channel"))
        );
    }

    #[test]
    fn test_non_string_honeypot_reads_as_empty() {
        let body = json!({ "message": "hello", "channel": "general", "website": 42 });
        assert_eq!(parse_submission(&body, "website").unwrap().honeypot, "");
    }
}
