pub mod ask;
pub mod automerge;
pub mod chat;
pub mod dispatcher;
pub mod doc;
pub mod handler;
pub mod registry;

use crate::config::Config;
use crate::core::error::LainError;
use crate::transport::ChatTransport;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use dispatcher::{CommandDispatcher, create_command_registry};
pub use registry::CommandRegistry;

/// Everything a command needs for one invocation.
pub struct CommandContext {
    pub config: Config,
    pub transport: Arc<dyn ChatTransport>,
    pub registry: Arc<CommandRegistry>,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> Result<(), LainError>;

    /// Invocation syntax, e.g. `lain ask <question>`
    fn usage(&self) -> &'static str;

    /// One-line summary shown by `help`
    fn description(&self) -> &'static str;
}

/// A candidate for bulk registration through `CommandRegistry::discover`.
pub struct CommandEntry {
    pub name: String,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandEntry {
    pub fn new<C: CommandHandler + 'static>(name: &str, command: C) -> Self {
        Self {
            name: name.to_string(),
            handler: Arc::new(command),
        }
    }
}

/// The commands discovered at startup, after `help` and `version`.
pub fn builtin_commands() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("ask", ask::AskCommand),
        CommandEntry::new("chat", chat::ChatCommand),
        CommandEntry::new("doc", doc::DocCommand),
        CommandEntry::new("automerge", automerge::AutoMergeCommand),
    ]
}
