//! Decoding of `text/event-stream` chat completion bodies.

use super::FragmentStream;
use crate::core::error::LainError;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Fragment(String),
    Done,
    Malformed(String),
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Interprets one event-stream line. Returns `None` for lines that carry
/// nothing to deliver.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();

    if payload.is_empty() {
        return None;
    }
    if payload == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Fragment),
        Err(e) => Some(SseEvent::Malformed(format!("{}: {}", e, payload))),
    }
}

/// Splits a byte stream into lines, holding back partial lines (and partial
/// UTF-8 sequences) until their newline arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(Self::decode(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Flushes a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(Self::decode(&raw))
    }

    fn decode(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<String, LainError>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn queue_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            match parse_line(&line) {
                Some(SseEvent::Fragment(text)) => self.pending.push_back(Ok(text)),
                Some(SseEvent::Malformed(reason)) => {
                    self.pending.push_back(Err(LainError::ChunkParse(reason)))
                }
                Some(SseEvent::Done) => {
                    self.finished = true;
                    return;
                }
                None => {}
            }
        }
    }
}

/// Turns a raw response body into a stream of text fragments.
///
/// Delivery stops at `data: [DONE]` or when `body` ends. A transport error
/// from `body` is yielded once and ends the stream.
pub fn fragment_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LainError> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(body),
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    let lines = state.decoder.push(bytes.as_ref());
                    state.queue_lines(lines);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.pending.push_back(Err(err.into()));
                }
                None => {
                    state.finished = true;
                    if let Some(line) = state.decoder.finish() {
                        state.queue_lines(vec![line]);
                    }
                }
            }
        }
    })
    .boxed()
}
