use crate::cli::Args;
use crate::commands::{CommandContext, CommandDispatcher};
use crate::config::Config;
use crate::core::error::LainError;
use crate::display;
use crate::transport::{ChatTransport, OpenAICompatibleTransport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Application {
    pub args: Args,
    pub config: Config,
    pub command_dispatcher: CommandDispatcher,
    pub cancel: CancellationToken,
}

impl Application {
    pub fn new(
        args: Args,
        config: Config,
        command_dispatcher: CommandDispatcher,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            args,
            config,
            command_dispatcher,
            cancel,
        }
    }

    pub async fn run(&self) -> Result<(), LainError> {
        let registry = self.command_dispatcher.registry();

        let Some(command) = self.args.command.as_deref() else {
            display::display_usage(&registry.descriptions());
            return Ok(());
        };

        let transport: Arc<dyn ChatTransport> =
            Arc::new(OpenAICompatibleTransport::new(&self.config.endpoint)?);
        let ctx = CommandContext {
            config: self.config.clone(),
            transport,
            registry: Arc::clone(&registry),
            cancel: self.cancel.clone(),
        };

        self.command_dispatcher
            .execute(command, &self.args.args, &ctx)
            .await
    }

    /// Prints a failed run's error, followed by the command list when the
    /// command was not recognised.
    pub fn report(&self, err: &LainError) {
        tracing::debug!("Command failed: {}", err);
        display::display_error(err);
        if let LainError::UnknownCommand(_) = err {
            display::display_command_list(&self.command_dispatcher.registry().descriptions());
        }
    }
}
