//! Tests for the SSE answer parser

use futures_util::stream;
use plexgate_core::engine::sse::{
    collect_answer, frames_from_bytes, AnswerAccumulator, FrameKind, StreamFrame, StreamOutcome,
};
use proptest::prelude::*;
use serde_json::json;
use test_case::test_case;

fn message_frame(ordinal: u64, payload: serde_json::Value) -> StreamFrame {
    StreamFrame {
        kind: FrameKind::Message,
        data: payload.to_string(),
        ordinal,
    }
}

fn end_frame(ordinal: u64) -> StreamFrame {
    StreamFrame {
        kind: FrameKind::EndOfStream,
        data: String::new(),
        ordinal,
    }
}

fn finish(frames: Vec<StreamFrame>) -> StreamOutcome {
    let mut acc = AnswerAccumulator::new();
    for frame in &frames {
        acc.ingest(frame);
        if acc.is_complete() {
            break;
        }
    }
    acc.finish()
}

#[test_case(json!({"text": [{"step_type": "FINAL_ANSWER", "content": {"text": "X"}}]}), "X"; "final answer step")]
#[test_case(json!({"text": [{"step_type": "ANSWER", "content": "direct string content"}]}), "direct string content"; "answer step with string content")]
#[test_case(json!({"text": [{"step_type": "RESPONSE", "content": {"text": "tagged response"}}]}), "tagged response"; "response step")]
#[test_case(json!({"answer": "mapped answer"}), "mapped answer"; "answer field probe")]
#[test_case(json!({"response": "mapped response"}), "mapped response"; "response field probe")]
#[test_case(json!({"output": "mapped output"}), "mapped output"; "output field probe")]
fn extraction_shapes(payload: serde_json::Value, expected: &str) {
    let outcome = finish(vec![message_frame(0, payload), end_frame(1)]);
    assert_eq!(outcome, StreamOutcome::Answer(expected.to_string()));
}

#[test]
fn double_encoded_answer_is_found() {
    let inner = json!({"answer": "forty-two"}).to_string();
    let outcome = finish(vec![
        message_frame(0, json!({"text": inner})),
        end_frame(1),
    ]);
    assert_eq!(outcome, StreamOutcome::Answer("forty-two".to_string()));
}

#[test]
fn growing_candidates_with_duplicate_keep_longest() {
    let outcome = finish(vec![
        message_frame(0, json!({"answer": "a"})),
        message_frame(1, json!({"answer": "ab"})),
        message_frame(2, json!({"answer": "ab"})),
        message_frame(3, json!({"answer": "abc"})),
        end_frame(4),
    ]);
    assert_eq!(outcome, StreamOutcome::Answer("abc".to_string()));
}

#[test]
fn completion_marker_halts_before_end_of_stream() {
    let mut acc = AnswerAccumulator::new();
    acc.ingest(&message_frame(
        0,
        json!({"answer": "final", "text_completed": true, "final": true}),
    ));
    assert!(acc.is_complete());
}

#[test]
fn status_completed_also_halts() {
    let mut acc = AnswerAccumulator::new();
    acc.ingest(&message_frame(0, json!({"answer": "final", "status": "completed"})));
    assert!(acc.is_complete());
}

#[test]
fn malformed_frames_never_fail_the_parse() {
    let frames = vec![
        StreamFrame {
            kind: FrameKind::Message,
            data: "definitely not json".to_string(),
            ordinal: 0,
        },
        message_frame(1, json!({"answer": "survived"})),
        end_frame(2),
    ];
    assert_eq!(finish(frames), StreamOutcome::Answer("survived".to_string()));
}

#[test]
fn terminator_only_yields_no_response() {
    assert_eq!(finish(vec![end_frame(0)]), StreamOutcome::NoResponse);
}

#[test]
fn no_frames_yields_empty() {
    assert_eq!(finish(Vec::new()), StreamOutcome::Empty);
}

#[tokio::test]
async fn collect_answer_over_async_frames() {
    let items: Vec<Result<StreamFrame, plexgate_core::engine::EngineError>> = vec![
        Ok(message_frame(0, json!({"answer": "short"}))),
        Ok(message_frame(1, json!({"answer": "a longer answer"}))),
        Ok(end_frame(2)),
    ];
    let outcome = collect_answer(Box::pin(stream::iter(items))).await;
    assert_eq!(outcome, StreamOutcome::Answer("a longer answer".to_string()));
}

#[tokio::test]
async fn frames_from_raw_sse_body() {
    let body = concat!(
        "event: message\r\n",
        "data: {\"answer\": \"hello\"}\r\n",
        "\r\n",
        "event: end_of_stream\r\n",
        "data: \r\n",
        "\r\n",
    );
    let bytes = stream::iter(vec![Ok::<_, std::convert::Infallible>(
        bytes::Bytes::from_static(body.as_bytes()),
    )]);
    let outcome = collect_answer(frames_from_bytes(bytes)).await;
    assert_eq!(outcome, StreamOutcome::Answer("hello".to_string()));
}

#[tokio::test]
async fn frames_stop_at_end_of_stream() {
    use futures_util::StreamExt;

    let body = concat!(
        "event: message\r\ndata: {\"answer\": \"a\"}\r\n\r\n",
        "event: end_of_stream\r\ndata: \r\n\r\n",
        "event: message\r\ndata: {\"answer\": \"late\"}\r\n\r\n",
    );
    let bytes = stream::iter(vec![Ok::<_, std::convert::Infallible>(
        bytes::Bytes::from_static(body.as_bytes()),
    )]);
    let frames: Vec<_> = frames_from_bytes(bytes).collect().await;
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frames.last().unwrap().as_ref().unwrap().kind,
        FrameKind::EndOfStream
    );
}

#[tokio::test]
async fn mid_stream_failure_surfaces_as_failed_event() {
    use futures_util::StreamExt;
    use plexgate_core::engine::sse::{answer_events, AnswerEvent};
    use plexgate_core::engine::EngineError;

    let items: Vec<Result<StreamFrame, EngineError>> = vec![
        Ok(message_frame(0, json!({"answer": "partial"}))),
        Err(EngineError::Transport("connection reset".to_string())),
    ];
    let events: Vec<AnswerEvent> = answer_events(Box::pin(stream::iter(items)))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], AnswerEvent::Snapshot(s) if s == "partial"));
    assert!(matches!(
        &events[1],
        AnswerEvent::Failed(EngineError::Transport(_))
    ));
}

proptest! {
    /// The retained candidate is always the longest extraction seen,
    /// regardless of arrival order.
    #[test]
    fn candidate_is_longest_seen(texts in proptest::collection::vec("[a-z]{0,40}", 1..20)) {
        let mut acc = AnswerAccumulator::new();
        for (i, text) in texts.iter().enumerate() {
            acc.ingest(&message_frame(i as u64, json!({"answer": text})));
        }
        acc.ingest(&end_frame(texts.len() as u64));

        // First text to reach each new greatest length wins; ties keep the
        // earlier candidate.
        let mut expected: Option<&String> = None;
        for text in &texts {
            if !text.is_empty() && text.len() > expected.map_or(0, |e| e.len()) {
                expected = Some(text);
            }
        }
        let want = match expected {
            Some(text) => StreamOutcome::Answer(text.clone()),
            None => StreamOutcome::NoResponse,
        };
        prop_assert_eq!(acc.finish(), want);
    }
}
