use super::{CommandContext, CommandHandler};
use crate::config::Config;
use crate::conversation::{ChatSession, Conversation, HistoryMode};
use crate::core::error::LainError;
use crate::display::Renderer;
use crate::input::{LineSource, PipedInput, TerminalInput};
use async_trait::async_trait;
use is_terminal::IsTerminal;
use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PROMPT: &str = "You> ";
const GREETING: &str = "Lain is in the chatroom. Type your messages. Type 'exit' to leave.";
const FAREWELL: &str = "Lain has left the chatroom.";
const EMPTY_HINT: &str = "Please ask a question or type 'exit' to quit.";

/// In-session commands, typed with a leading '/'
pub const SESSION_COMMANDS: &[(&str, &str)] = &[
    ("reset", "/reset - Forget the conversation so far"),
    ("save", "/save [file] - Save the conversation as JSON"),
    ("help", "/help - Show session commands"),
];

pub struct ChatCommand;

#[async_trait]
impl CommandHandler for ChatCommand {
    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> Result<(), LainError> {
        let mut session = ChatSession::new(Arc::clone(&ctx.transport), HistoryMode::Accumulate)
            .with_system_prompt(ctx.config.system_prompt.clone());
        let mut renderer = Renderer::stdout();
        let history_dir = Config::history_dir();

        if io::stdin().is_terminal() {
            let names = SESSION_COMMANDS.iter().map(|(name, _)| name.to_string()).collect();
            let mut input = TerminalInput::new(names)?;
            let result =
                run_chat(&mut session, &mut input, &mut renderer, &ctx.cancel, &history_dir).await;
            if let Err(e) = input.save_history() {
                tracing::warn!("{}", e);
            }
            result
        } else {
            let mut input = PipedInput::new(BufReader::new(io::stdin()));
            run_chat(&mut session, &mut input, &mut renderer, &ctx.cancel, &history_dir).await
        }
    }

    fn usage(&self) -> &'static str {
        "lain chat"
    }

    fn description(&self) -> &'static str {
        "Start an interactive chat that remembers earlier turns"
    }
}

/// Runs the read-send-render loop until `exit`, end of input or
/// cancellation. Each turn waits for the previous reply to finish.
pub async fn run_chat<L: LineSource, W: Write>(
    session: &mut ChatSession,
    input: &mut L,
    renderer: &mut Renderer<W>,
    cancel: &CancellationToken,
    history_dir: &Path,
) -> Result<(), LainError> {
    renderer.line(GREETING)?;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Some(line) = input.read_line(PROMPT)? else {
            break;
        };
        let line = line.trim();

        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.is_empty() {
            renderer.line(EMPTY_HINT)?;
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            run_session_command(session, command, renderer, history_dir)?;
            continue;
        }

        match session.exchange(line, cancel, renderer).await {
            Ok(_) => {}
            Err(LainError::Cancelled) => {
                renderer.line("Interrupted.")?;
                break;
            }
            Err(e) => {
                tracing::debug!("Chat turn failed: {}", e);
                renderer.error(&e);
            }
        }
    }

    renderer.line(FAREWELL)?;
    Ok(())
}

fn run_session_command<W: Write>(
    session: &mut ChatSession,
    command: &str,
    renderer: &mut Renderer<W>,
    history_dir: &Path,
) -> Result<(), LainError> {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "reset" => {
            session.reset();
            renderer.line("Chat history cleared.")?;
        }
        "save" => match save_transcript(session.conversation(), history_dir, parts.next()) {
            Ok(path) => renderer.line(&format!("History saved to: {}", path.display()))?,
            Err(e) => renderer.error(&e),
        },
        "help" => {
            for (_, help) in SESSION_COMMANDS {
                renderer.line(help)?;
            }
        }
        other => renderer.error(&LainError::UnknownCommand(format!("/{}", other))),
    }
    Ok(())
}

/// Writes the conversation to `dir` as pretty JSON. Without a name the file
/// is named after the current local time.
pub fn save_transcript(
    conversation: &Conversation,
    dir: &Path,
    name: Option<&str>,
) -> Result<PathBuf, LainError> {
    let filename = match name {
        Some(name) => name.to_string(),
        None => chrono::Local::now().format("%Y%m%d_%H%M%S.json").to_string(),
    };

    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let file = fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, conversation.messages())?;

    tracing::info!("Saved {} messages to {}", conversation.len(), path.display());
    Ok(path)
}
