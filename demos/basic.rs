//! Basic example running a few messages through the pipeline.
//!
//! Shows content refusals, the burst limit, the honeypot, and the moderation
//! events emitted on the `abuse_gate::moderation` target.

use abuse_gate::{AbusePipeline, SubmissionHandler, SubmissionRequest};
use serde_json::json;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pipeline = AbusePipeline::builder()
        .build()
        .expect("default options are valid");
    let sweeper = pipeline.start_sweeper();

    println!("=== Abuse Gate Example ===\n");

    println!("Content checks:");
    for text in [
        "hi",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA with some other text",
        "a\nb\nc\nd\ne\nf\ng\nh\ni\nj",
        "  Hello   world!  \n\n\n  How are you?  ",
    ] {
        let outcome = pipeline.process_message(text, "demo-session", "general", "");
        println!("  {:?} -> {}", text, serde_json::to_string(&outcome).unwrap_or_default());
    }

    println!("\nBurst limit (3 per 2 minutes):");
    for i in 1..=4 {
        let outcome =
            pipeline.process_message(&format!("Message number {}", i), "burst-session", "general", "");
        println!("  #{} accepted: {}", i, outcome.is_accepted());
    }
    let other = pipeline.process_message("Over in random", "burst-session", "random", "");
    println!("  other channel accepted: {}", other.is_accepted());

    println!("\nRequest boundary:");
    let handler = SubmissionHandler::with_html_sanitizer(pipeline.clone());
    let requests = [
        SubmissionRequest::new(json!({ "message": "Is <b>anyone</b> around?", "channel": "help" }))
            .with_header("x-session-id", "boundary-session"),
        SubmissionRequest::new(json!({
            "message": "Cheap watches, click now",
            "channel": "help",
            "website": "http://spam.example",
        })),
        SubmissionRequest::new(json!({ "channel": "help" })),
    ];
    for request in &requests {
        let response = handler.handle(request);
        println!("  {} {}", response.status, response.body);
    }

    pipeline.flush_moderation().await;

    let snapshot = pipeline.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!(
        "Accepted: {}, rejected: {}, moderation events: {}",
        snapshot.messages_accepted,
        snapshot.rejections_total(),
        snapshot.moderation_emitted
    );

    sweeper.shutdown().await.expect("sweeper shutdown failed");
}
