use abuse_gate::infrastructure::mocks::MockClock;
use abuse_gate::{
    validate, AbusePipeline, MemorySink, ModerationReason, PipelineOptions, RateLimitOptions,
    RejectionReason, ValidationOptions,
};
use std::sync::Arc;

const T0: u64 = 1_700_000_000_000;

fn pipeline_with(options: PipelineOptions) -> (AbusePipeline, Arc<MemorySink>, MockClock) {
    let clock = MockClock::new(T0);
    let sink = Arc::new(MemorySink::new());
    let pipeline = AbusePipeline::builder()
        .with_options(options)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(sink.clone())
        .with_detached_moderation(false)
        .build()
        .unwrap();
    (pipeline, sink, clock)
}

fn fixed_window_options() -> PipelineOptions {
    PipelineOptions::builder()
        .rate_limit(RateLimitOptions::fixed_window(1, 30_000).unwrap())
        .build()
        .unwrap()
}

#[test]
fn test_short_text_is_too_short() {
    let options = ValidationOptions::strict();
    for text in ["", "    ", "hi", "  abcd  ", "a\n\nb"] {
        assert_eq!(
            validate(text, &options).reason(),
            Some(RejectionReason::TooShort),
            "{:?}",
            text
        );
    }
}

#[test]
fn test_long_text_is_checked_before_normalization() {
    let options = ValidationOptions::strict();
    // Collapses to well under 350 characters, but the raw text is too long
    let padded = format!("Hello{}world", " ".repeat(400));
    assert_eq!(
        validate(&padded, &options).reason(),
        Some(RejectionReason::TooLong)
    );

    let lenient = ValidationOptions::lenient();
    let text = "word ".repeat(80);
    assert_eq!(
        validate(&text, &options).reason(),
        Some(RejectionReason::TooLong)
    );
    assert!(validate(&text, &lenient).is_accepted());
}

#[test]
fn test_repeated_characters_are_repetitive() {
    let result = validate(
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA with some other text",
        &ValidationOptions::strict(),
    );
    assert_eq!(result.reason(), Some(RejectionReason::RepetitiveContent));
}

#[test]
fn test_many_paragraphs_exceed_line_breaks() {
    let result = validate(
        "Line 1\n\nLine 2\n\nLine 3\n\nLine 4\n\nLine 5\n\nLine 6",
        &ValidationOptions::strict(),
    );
    assert_eq!(result.reason(), Some(RejectionReason::TooManyLineBreaks));
}

#[test]
fn test_one_letter_lines_are_short_line_spam() {
    let result = validate("a\nb\nc\nd\ne\nf\ng\nh\ni\nj", &ValidationOptions::strict());
    assert_eq!(result.reason(), Some(RejectionReason::ShortLineSpam));
}

#[test]
fn test_normalization_keeps_paragraph_break() {
    let result = validate(
        "  Hello   world!  \n\n\n  How are you?  ",
        &ValidationOptions::strict(),
    );
    assert_eq!(result.normalized(), Some("Hello world!\n\nHow are you?"));
}

#[test]
fn test_validation_is_idempotent() {
    let options = ValidationOptions::strict();
    let text = "  Some   message\n\n\n\nwith gaps  ";

    let first = validate(text, &options);
    let second = validate(text, &options);
    assert_eq!(first, second);

    // Normalized output validates to itself
    let normalized = first.normalized().unwrap();
    assert_eq!(validate(normalized, &options).normalized(), Some(normalized));
}

#[test]
fn test_fixed_window_denies_second_call() {
    let (pipeline, _, clock) = pipeline_with(fixed_window_options());

    let first = pipeline.process_message("First message", "s1", "general", "");
    clock.advance_ms(29_999);
    let second = pipeline.process_message("Second message", "s1", "general", "");

    assert!(first.is_accepted());
    assert_eq!(second.reason(), Some(RejectionReason::RateLimited));
}

#[test]
fn test_burst_limit_is_per_channel() {
    let (pipeline, _, clock) = pipeline_with(PipelineOptions::default());

    for i in 0..3 {
        let outcome = pipeline.process_message(&format!("Message number {}", i), "s1", "general", "");
        assert!(outcome.is_accepted(), "message {} refused", i);
        clock.advance_ms(1_000);
    }
    let fourth = pipeline.process_message("Message number 3", "s1", "general", "");
    assert_eq!(fourth.reason(), Some(RejectionReason::RateLimited));

    // Same identity, different channel: full allowance
    for i in 0..3 {
        let outcome = pipeline.process_message(&format!("Elsewhere {}", i), "s1", "random", "");
        assert!(outcome.is_accepted());
    }
}

#[test]
fn test_honeypot_overrides_valid_content() {
    let (pipeline, sink, _) = pipeline_with(PipelineOptions::default());

    for value in ["x", "  http://spam.example  ", "0"] {
        let outcome = pipeline.process_message("A perfectly fine message", "s1", "general", value);
        assert_eq!(outcome.reason(), Some(RejectionReason::SpamDetected));
    }
    assert!(pipeline
        .process_message("A perfectly fine message", "s1", "general", "   ")
        .is_accepted());

    let reasons: Vec<ModerationReason> = sink.events().iter().map(|e| e.reason()).collect();
    assert_eq!(reasons, vec![ModerationReason::HoneypotTriggered; 3]);
}

#[test]
fn test_swept_key_is_treated_as_new() {
    let (pipeline, _, clock) = pipeline_with(fixed_window_options());

    assert!(pipeline
        .process_message("Hello there", "s1", "general", "")
        .is_accepted());
    clock.advance_ms(300_001);
    assert_eq!(pipeline.sweep(), 1);
    assert!(pipeline.limiter().entry("s1", "general").is_none());

    let outcome = pipeline.process_message("Hello again", "s1", "general", "");
    assert!(outcome.is_accepted());
    let entry = pipeline.limiter().entry("s1", "general").unwrap();
    assert_eq!(entry.count, 1);
    assert_eq!(entry.window_start_ms, T0 + 300_001);
}

#[test]
fn test_steady_expiry_reopens_during_burst_cooldown() {
    let (pipeline, _, clock) = pipeline_with(PipelineOptions::default());

    for _ in 0..3 {
        pipeline.process_message("Quick message", "s1", "general", "");
    }
    assert!(!pipeline
        .process_message("Quick message", "s1", "general", "")
        .is_accepted());

    // Burst window (120s) still open, steady window (30s) elapsed
    clock.advance_ms(30_001);
    assert!(pipeline
        .process_message("Quick message", "s1", "general", "")
        .is_accepted());
}

#[test]
fn test_every_rejection_is_logged_with_its_reason() {
    let (pipeline, sink, _) = pipeline_with(fixed_window_options());

    pipeline.process_message("hey", "session-abcdefgh-123", "general", "");
    pipeline.process_message(&"x".repeat(351), "session-abcdefgh-123", "general", "");
    pipeline.process_message("Fine message", "session-abcdefgh-123", "general", "");
    pipeline.process_message("Another fine one", "session-abcdefgh-123", "general", "");

    let events = sink.events();
    let codes: Vec<&str> = events.iter().map(|e| e.reason().code()).collect();
    assert_eq!(codes, vec!["too_short", "too_long", "rate_limited"]);

    for event in &events {
        assert_eq!(event.partial_identity(), "session-");
        assert!(event.truncated_text().chars().count() <= 53);
        assert_eq!(event.channel(), "general");
    }
    assert!(events[1].truncated_text().ends_with("..."));
}

#[test]
fn test_per_call_options_override_defaults() {
    let (pipeline, _, _) = pipeline_with(PipelineOptions::default());
    let relaxed = PipelineOptions::builder()
        .validation(ValidationOptions::builder().min_length(1).build().unwrap())
        .build()
        .unwrap();

    assert_eq!(
        pipeline.process_message("ok", "s1", "general", "").reason(),
        Some(RejectionReason::TooShort)
    );
    assert!(pipeline
        .process_message_with("ok", "s1", "general", "", &relaxed)
        .is_accepted());
}

#[test]
fn test_custom_honeypot_field_from_json_options() {
    let options: PipelineOptions =
        serde_json::from_str(r#"{ "honeypotFieldName": "homepage", "minLength": 3 }"#).unwrap();
    let (pipeline, _, _) = pipeline_with(options);

    assert_eq!(pipeline.options().honeypot_field_name(), "homepage");
    assert!(pipeline.process_message("hey", "s1", "general", "").is_accepted());
}
