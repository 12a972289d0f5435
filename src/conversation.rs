use crate::core::error::LainError;
use crate::display::Renderer;
use crate::transport::{
    ChatMessage, ChatTransport, FragmentSink, StreamOutcome, StreamSummary, drain,
};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ordered turns of one session.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        tracing::info!("Chat history has been reset");
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Renders a reply while keeping its full text for the history.
struct ReplyCapture<'a, W: Write> {
    renderer: &'a mut Renderer<W>,
    reply: String,
}

impl<W: Write> FragmentSink for ReplyCapture<'_, W> {
    fn fragment(&mut self, text: &str) -> Result<(), LainError> {
        self.reply.push_str(text);
        self.renderer.fragment(text)
    }

    fn error(&mut self, err: &LainError) {
        self.renderer.error(err);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Each request carries only the current message
    Stateless,
    /// Each request carries every completed turn plus the current message
    Accumulate,
}

/// One conversation with the model, as driven by a single command.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    mode: HistoryMode,
    system_prompt: Option<ChatMessage>,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, mode: HistoryMode) -> Self {
        Self {
            transport,
            mode,
            system_prompt: None,
            conversation: Conversation::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .map(ChatMessage::system);
        self
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Message list for the next request carrying `user`.
    pub fn request_messages(&self, user: &ChatMessage) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 2);
        if let Some(system) = &self.system_prompt {
            messages.push(system.clone());
        }
        if self.mode == HistoryMode::Accumulate {
            messages.extend(self.conversation.messages().iter().cloned());
        }
        messages.push(user.clone());
        messages
    }

    /// Sends `prompt`, renders the streamed reply and, in history mode,
    /// records the turn once the reply completed. A connection lost mid-reply
    /// is returned as an error and leaves the history untouched.
    pub async fn exchange<W: Write>(
        &mut self,
        prompt: &str,
        cancel: &CancellationToken,
        renderer: &mut Renderer<W>,
    ) -> Result<StreamSummary, LainError> {
        let user = ChatMessage::user(prompt);
        let messages = self.request_messages(&user);
        tracing::info!("Sending user message ({} chars)", prompt.len());

        let stream = self.transport.send(&messages).await?;

        renderer.begin_reply();
        let mut capture = ReplyCapture {
            renderer: &mut *renderer,
            reply: String::new(),
        };
        let drained = drain(stream, cancel, &mut capture).await;
        let reply = capture.reply;
        renderer.end_reply()?;

        // A reply cut off by a failed connection is never recorded
        let summary = drained?;

        if summary.outcome == StreamOutcome::Cancelled {
            return Err(LainError::Cancelled);
        }

        if self.mode == HistoryMode::Accumulate && !reply.is_empty() {
            self.conversation.append(user);
            self.conversation.append(ChatMessage::assistant(reply));
        }

        tracing::info!("Finished streaming reply ({} fragments)", summary.fragments);
        Ok(summary)
    }
}
