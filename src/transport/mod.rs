pub mod openai_compatible;
pub mod sse;

use crate::core::error::LainError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use openai_compatible::OpenAICompatibleTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lazily produced text fragments of one streamed reply, in arrival order.
///
/// An `Err` item is either a per-chunk parse failure (the stream keeps going)
/// or a connection failure (the stream ends right after it).
pub type FragmentStream = BoxStream<'static, Result<String, LainError>>;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issues one streaming chat request carrying `messages` in order.
    ///
    /// A non-success status or a failed connection is returned here, before
    /// any fragment is produced.
    async fn send(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    pub fragments: usize,
    pub errors: usize,
}

impl StreamSummary {
    pub fn is_clean(&self) -> bool {
        self.outcome == StreamOutcome::Completed && self.errors == 0
    }
}

/// Receives what a drained stream produces.
pub trait FragmentSink {
    fn fragment(&mut self, text: &str) -> Result<(), LainError>;

    /// A malformed chunk; the stream keeps going afterwards.
    fn error(&mut self, err: &LainError);
}

/// Pulls `stream` to the end, handing fragments and chunk errors to `sink`.
///
/// `cancel` is checked between reads. An error returned by the sink aborts
/// the drain and is propagated, as does any stream error other than
/// `ChunkParse` (the connection died and the reply is incomplete).
pub async fn drain<S: FragmentSink>(
    mut stream: FragmentStream,
    cancel: &CancellationToken,
    sink: &mut S,
) -> Result<StreamSummary, LainError> {
    let mut summary = StreamSummary {
        outcome: StreamOutcome::Completed,
        fragments: 0,
        errors: 0,
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Stream cancelled after {} fragments", summary.fragments);
                summary.outcome = StreamOutcome::Cancelled;
                return Ok(summary);
            }
            item = stream.next() => match item {
                Some(Ok(fragment)) => {
                    tracing::debug!("Received fragment: {:?}", fragment);
                    summary.fragments += 1;
                    sink.fragment(&fragment)?;
                }
                Some(Err(err @ LainError::ChunkParse(_))) => {
                    tracing::debug!("Skipping chunk: {}", err);
                    summary.errors += 1;
                    sink.error(&err);
                }
                Some(Err(err)) => {
                    tracing::debug!(
                        "Stream failed after {} fragments: {}",
                        summary.fragments,
                        err
                    );
                    return Err(err);
                }
                None => return Ok(summary),
            }
        }
    }
}
