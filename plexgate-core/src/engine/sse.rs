//! SSE answer stream parsing
//!
//! The engine streams one query's progress as SSE frames: `message` frames
//! carrying a JSON payload, then an `end_of_stream` terminator. Payloads
//! are inconsistent across engine versions and modes; a `message` frame
//! may carry its content as a step sequence, an answer-shaped mapping, or
//! a bare string, and the interesting part is often a JSON document
//! string-encoded inside the outer JSON (double-encoding).
//!
//! Extraction runs an ordered chain of strategies per frame, keeps the
//! longest text seen so far as the running candidate, and halts as soon as
//! a frame carries a completion marker. The parser never fails: frames
//! that cannot be decoded are skipped, and a stream with no extractable
//! content resolves to [`StreamOutcome::NoResponse`].
//!
//! The longest-candidate rule assumes stream snapshots are monotonically
//! expanding; a longer-but-wrong late candidate would win. Kept as a
//! compatibility approximation.

use crate::engine::error::EngineError;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::pin::Pin;
use tracing::{debug, warn};

/// Discriminates the engine's two frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Payload-carrying frame
    Message,
    /// Stream terminator
    EndOfStream,
}

/// One discrete unit of the engine's SSE stream, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub kind: FrameKind,
    /// Raw `data:` payload, undecoded
    pub data: String,
    /// Position in arrival order, starting at zero
    pub ordinal: u64,
}

/// Live frame sequence bound to one engine connection. Dropping the stream
/// drops the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, EngineError>> + Send>>;

/// Result of consuming one query's frame stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// Extracted answer text
    Answer(String),
    /// Frames arrived but none yielded extractable content
    NoResponse,
    /// The connection closed without a single frame
    Empty,
}

/// Incremental events for streamed consumption.
#[derive(Debug)]
pub enum AnswerEvent {
    /// The running candidate grew; carries the full snapshot so far
    Snapshot(String),
    /// The connection failed mid-stream
    Failed(EngineError),
    /// Frame consumption halted; final answer selection
    Finished(StreamOutcome),
}

/// Convert an SSE byte stream into engine frames.
///
/// Frames after the `end_of_stream` terminator are never read; a transport
/// error ends the sequence with one `Err` item.
pub fn frames_from_bytes<S, B, E>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let out = async_stream::stream! {
        let events = bytes.eventsource();
        tokio::pin!(events);
        let mut ordinal = 0u64;
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let kind = match event.event.as_str() {
                        "end_of_stream" => FrameKind::EndOfStream,
                        _ => FrameKind::Message,
                    };
                    let done = kind == FrameKind::EndOfStream;
                    yield Ok(StreamFrame {
                        kind,
                        data: event.data,
                        ordinal,
                    });
                    ordinal += 1;
                    if done {
                        return;
                    }
                }
                Err(err) => {
                    yield Err(EngineError::Transport(format!("stream error: {err}")));
                    return;
                }
            }
        }
    };
    Box::pin(out)
}

// ---------------------------------------------------------------------------
// Payload decoding and extraction strategies
// ---------------------------------------------------------------------------

/// Decode a message frame's payload, applying the double-decoding step: a
/// string-valued `text` field is itself parsed as JSON when possible.
fn decode_payload(data: &str) -> Option<Value> {
    let mut payload: Value = serde_json::from_str(data).ok()?;
    if let Some(Value::String(inner)) = payload.get("text") {
        if let Ok(parsed) = serde_json::from_str::<Value>(inner) {
            payload["text"] = parsed;
        }
    }
    Some(payload)
}

/// The effective payload shapes, after decoding.
enum Shape<'a> {
    /// A sequence of step records
    Steps(&'a [Value]),
    /// An answer-shaped mapping
    AnswerMap(&'a Map<String, Value>),
    /// A bare string
    Text(&'a str),
}

fn classify(payload: &Value) -> Option<Shape<'_>> {
    match payload.get("text") {
        Some(Value::Array(steps)) => Some(Shape::Steps(steps)),
        Some(Value::String(s)) => Some(Shape::Text(s)),
        Some(Value::Object(map)) => Some(Shape::AnswerMap(map)),
        _ => payload.as_object().map(Shape::AnswerMap),
    }
}

/// Content of a step record: `content.text` when content is a mapping,
/// else the content string itself.
fn step_content_text(step: &Value) -> Option<&str> {
    match step.get("content") {
        Some(Value::Object(content)) => content.get("text").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Strategy 1: forward scan for an answer-tagged step.
fn extract_tagged_step(steps: &[Value]) -> Option<String> {
    steps
        .iter()
        .filter(|step| {
            matches!(
                step.get("step_type").and_then(Value::as_str),
                Some("ANSWER") | Some("FINAL_ANSWER") | Some("RESPONSE")
            )
        })
        .filter_map(step_content_text)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Strategy 2: reverse scan for the last substantial step content.
fn extract_trailing_step(steps: &[Value]) -> Option<String> {
    steps
        .iter()
        .rev()
        .filter_map(step_content_text)
        .find(|text| text.trim().len() > 10)
        .map(str::to_string)
}

/// Strategy 3: a bare string used directly.
fn extract_plain(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Strategy 4: probe fixed field names, in order.
fn probe_named_fields(map: &Map<String, Value>) -> Option<String> {
    ["answer", "response", "result", "output"]
        .iter()
        .filter_map(|field| map.get(*field).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Run the extraction chain against one decoded payload. First strategy
/// that yields non-empty text wins.
pub(crate) fn extract_text(payload: &Value) -> Option<String> {
    let top = payload.as_object();
    let probe_top = || top.and_then(probe_named_fields);
    match classify(payload)? {
        Shape::Steps(steps) => extract_tagged_step(steps)
            .or_else(|| extract_trailing_step(steps))
            .or_else(probe_top),
        Shape::Text(text) => extract_plain(text).or_else(probe_top),
        Shape::AnswerMap(map) => probe_named_fields(map).or_else(|| {
            // The mapping may have been the nested text object; fall back
            // to the outer payload's fields.
            match top {
                Some(outer) if !std::ptr::eq(outer, map) => probe_named_fields(outer),
                _ => None,
            }
        }),
    }
}

/// Whether this payload signals stream completion.
pub(crate) fn is_terminal(payload: &Value) -> bool {
    let flag = |key: &str| payload.get(key).and_then(Value::as_bool).unwrap_or(false);
    (flag("text_completed") && flag("final"))
        || payload.get("status").and_then(Value::as_str) == Some("completed")
}

// ---------------------------------------------------------------------------
// Candidate accumulation
// ---------------------------------------------------------------------------

/// Frame-by-frame answer accumulator.
///
/// Retains whichever extraction has the greatest length seen so far; the
/// candidate never shrinks. Completion markers halt ingestion.
#[derive(Debug, Default)]
pub struct AnswerAccumulator {
    candidate: String,
    last_payload: Option<Value>,
    frames: u64,
    complete: bool,
}

impl AnswerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame. Returns the new candidate snapshot when it grew.
    pub fn ingest(&mut self, frame: &StreamFrame) -> Option<String> {
        if self.complete {
            return None;
        }
        self.frames += 1;
        match frame.kind {
            FrameKind::EndOfStream => {
                self.complete = true;
                None
            }
            FrameKind::Message => {
                let Some(payload) = decode_payload(&frame.data) else {
                    debug!(ordinal = frame.ordinal, "skipping undecodable frame");
                    return None;
                };
                let grown = match extract_text(&payload) {
                    Some(text) if text.len() > self.candidate.len() => {
                        self.candidate = text.clone();
                        Some(text)
                    }
                    _ => None,
                };
                if is_terminal(&payload) {
                    debug!(ordinal = frame.ordinal, "completion marker observed");
                    self.complete = true;
                }
                self.last_payload = Some(payload);
                grown
            }
        }
    }

    /// Whether a completion marker or terminator frame was observed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Select the final answer: the retained candidate if non-empty, else
    /// the last frame's extractable content, else no response.
    pub fn finish(self) -> StreamOutcome {
        if self.frames == 0 {
            return StreamOutcome::Empty;
        }
        if !self.candidate.is_empty() {
            return StreamOutcome::Answer(unescape_answer(&self.candidate));
        }
        if let Some(text) = self.last_payload.as_ref().and_then(extract_text) {
            return StreamOutcome::Answer(unescape_answer(&text));
        }
        StreamOutcome::NoResponse
    }
}

/// Consume a frame stream to completion and select the final answer.
///
/// Transport errors mid-stream end consumption; whatever was accumulated
/// up to that point is still selected.
pub async fn collect_answer(mut frames: FrameStream) -> StreamOutcome {
    let mut acc = AnswerAccumulator::new();
    while let Some(item) = frames.next().await {
        match item {
            Ok(frame) => {
                acc.ingest(&frame);
                if acc.is_complete() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "frame stream failed; selecting from accumulated frames");
                break;
            }
        }
    }
    acc.finish()
}

/// Consume a frame stream incrementally, yielding each grown candidate
/// snapshot, then the final selection. A mid-stream transport failure
/// yields [`AnswerEvent::Failed`] and ends the sequence.
pub fn answer_events(frames: FrameStream) -> impl Stream<Item = AnswerEvent> + Send {
    async_stream::stream! {
        let mut frames = frames;
        let mut acc = AnswerAccumulator::new();
        while let Some(item) = frames.next().await {
            match item {
                Ok(frame) => {
                    if let Some(snapshot) = acc.ingest(&frame) {
                        yield AnswerEvent::Snapshot(snapshot);
                    }
                    if acc.is_complete() {
                        break;
                    }
                }
                Err(err) => {
                    yield AnswerEvent::Failed(err);
                    return;
                }
            }
        }
        yield AnswerEvent::Finished(acc.finish());
    }
}

// ---------------------------------------------------------------------------
// Escape reversal
// ---------------------------------------------------------------------------

/// Reverse backslash escape sequences left behind by double-encoding
/// (`\uXXXX`, `\n`, and friends). Returns the input unchanged if it
/// contains no escapes or any escape is malformed; this step never fails
/// the overall extraction.
pub fn unescape_answer(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    try_unescape(s).unwrap_or_else(|| s.to_string())
}

fn try_unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '/' => out.push('/'),
            '\\' => out.push('\\'),
            'u' => {
                let unit = read_hex4(&mut chars)?;
                let code_point = if (0xD800..0xDC00).contains(&unit) {
                    // High surrogate: a low surrogate escape must follow.
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    unit
                };
                out.push(char::from_u32(code_point)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}
