//! Translation Demo - Chat Request to Engine Query
//!
//! This example walks the adapter core offline:
//! - Model resolution against the registry
//! - Query construction from a multi-message conversation
//! - Answer extraction from the engine's inconsistent payload shapes
//! - Response encoding with the word-count usage estimate
//!
//! Run with: cargo run --example translation_demo

use plexgate_core::adapter::{encode, translate};
use plexgate_core::engine::sse::{AnswerAccumulator, FrameKind, StreamFrame, StreamOutcome};
use plexgate_core::protocol::{ChatCompletionRequest, ChatMessage};
use plexgate_core::registry::ModelRegistry;
use serde_json::json;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("\n🔁 Plexgate Translation Demo\n");
    println!("=============================\n");

    let registry = ModelRegistry::builtin();
    let request = ChatCompletionRequest::new(
        "perplexity-reasoning-r1",
        vec![
            ChatMessage::system("You are a concise research assistant"),
            ChatMessage::user("Why is the sky blue?"),
            ChatMessage::assistant("(an earlier answer, never replayed)"),
            ChatMessage::user("Answer in one sentence."),
        ],
    );

    println!("📝 Inbound request:");
    println!("  - Model: {}", request.model);
    println!("  - Messages: {}", request.messages.len());

    let spec = translate::resolve_model(&registry, &request.model).expect("model is registered");
    let params = translate::build_params(&request, spec, "en-US");

    println!("\n🔄 Engine parameters:");
    println!("  - Mode: {}", params.mode);
    println!("  - Underlying model: {:?}", params.model);
    println!("  - Sources: {:?}", params.sources);
    println!("\n🔎 Built query:\n---\n{}\n---", params.query);

    // Replay a captured-style frame sequence through the parser.
    let frames = vec![
        StreamFrame {
            kind: FrameKind::Message,
            data: json!({"answer": "Rayleigh"}).to_string(),
            ordinal: 0,
        },
        StreamFrame {
            kind: FrameKind::Message,
            data: json!({
                "text": json!({
                    "answer": "Sunlight scatters off air molecules, and blue scatters most."
                })
                .to_string(),
                "status": "completed"
            })
            .to_string(),
            ordinal: 1,
        },
    ];

    let mut acc = AnswerAccumulator::new();
    for frame in &frames {
        acc.ingest(frame);
        if acc.is_complete() {
            break;
        }
    }
    let answer = match acc.finish() {
        StreamOutcome::Answer(text) => text,
        _ => encode::NO_RESPONSE_APOLOGY.to_string(),
    };

    println!("\n📡 Extracted answer:\n  {answer}");

    let response = encode::completion_response(&request.model, &params.query, &answer);
    let usage = response.usage.expect("usage is always estimated");
    println!("\n📤 Encoded completion:");
    println!("  - Id: {}", response.id);
    println!(
        "  - Usage: {} prompt + {} completion = {} total (word-count estimate)",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );
    println!(
        "  - Finish reason: {}",
        response.choices[0].finish_reason.as_deref().unwrap_or("-")
    );
}
