use super::{CommandContext, CommandHandler};
use crate::conversation::{ChatSession, HistoryMode};
use crate::core::error::LainError;
use crate::display::Renderer;
use crate::transport::{ChatTransport, StreamSummary};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "lain ask <question>";

pub struct AskCommand;

#[async_trait]
impl CommandHandler for AskCommand {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> Result<(), LainError> {
        let question = args.join(" ");
        let question = question.trim();
        if question.is_empty() {
            return Err(LainError::MissingArgument { usage: USAGE });
        }

        let mut renderer = Renderer::stdout();
        ask(
            Arc::clone(&ctx.transport),
            ctx.config.system_prompt.clone(),
            question,
            &ctx.cancel,
            &mut renderer,
        )
        .await?;
        Ok(())
    }

    fn usage(&self) -> &'static str {
        USAGE
    }

    fn description(&self) -> &'static str {
        "Ask a single question and stream the answer"
    }
}

/// Sends one stateless question and streams the answer into `renderer`.
pub async fn ask<W: Write>(
    transport: Arc<dyn ChatTransport>,
    system_prompt: Option<String>,
    question: &str,
    cancel: &CancellationToken,
    renderer: &mut Renderer<W>,
) -> Result<StreamSummary, LainError> {
    let mut session =
        ChatSession::new(transport, HistoryMode::Stateless).with_system_prompt(system_prompt);
    session.exchange(question, cancel, renderer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::context;
    use crate::conversation::testing::ScriptedTransport;
    use crate::transport::ChatMessage;

    #[tokio::test]
    async fn test_missing_question_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctx = context(transport.clone());

        let result = AskCommand.execute(&ctx, &["  ".to_string()]).await;

        assert!(matches!(
            result,
            Err(LainError::MissingArgument { usage: "lain ask <question>" })
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_ask_streams_single_message() {
        let transport = Arc::new(ScriptedTransport::new().reply(&["Rust ", "is ", "great"]));
        let mut renderer = Renderer::new(Vec::new());

        let summary = ask(
            transport.clone(),
            None,
            "what is rust?",
            &CancellationToken::new(),
            &mut renderer,
        )
        .await
        .unwrap();

        assert_eq!(summary.fragments, 3);
        assert_eq!(
            transport.requests(),
            vec![vec![ChatMessage::user("what is rust?")]]
        );
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(console::strip_ansi_codes(&out), "lain> Rust is great\n");
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_once() {
        let transport = Arc::new(ScriptedTransport::new().fail(LainError::Status {
            status: 503,
            body: "loading model".to_string(),
        }));
        let mut renderer = Renderer::new(Vec::new());

        let result = ask(
            transport,
            None,
            "hi",
            &CancellationToken::new(),
            &mut renderer,
        )
        .await;

        assert!(matches!(result, Err(LainError::Status { status: 503, .. })));
        assert!(renderer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_connection_lost_mid_reply_is_an_error() {
        let transport = Arc::new(ScriptedTransport::new().reply_items(vec![
            Ok("The answer is".to_string()),
            Err(LainError::Transport("connection reset".to_string())),
        ]));
        let mut renderer = Renderer::new(Vec::new());

        let result = ask(
            transport,
            None,
            "q",
            &CancellationToken::new(),
            &mut renderer,
        )
        .await;

        assert!(matches!(result, Err(LainError::Transport(_))));
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(console::strip_ansi_codes(&out), "lain> The answer is\n");
    }
}
