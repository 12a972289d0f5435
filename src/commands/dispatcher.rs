use super::{
    CommandContext, builtin_commands,
    handler::{HelpCommand, VersionCommand},
    registry::CommandRegistry,
};
use crate::core::error::LainError;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(
        &self,
        command: &str,
        args: &[String],
        ctx: &CommandContext,
    ) -> Result<(), LainError> {
        let handler = self
            .registry
            .lookup(command)
            .ok_or_else(|| LainError::UnknownCommand(command.to_string()))?;
        tracing::info!("Executing command '{}' with {} args", command, args.len());
        handler.execute(ctx, args).await
    }

    pub fn registry(&self) -> Arc<CommandRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.registry.list()
    }
}

/// Builds the startup registry: `help` and `version` through the strict
/// path, then the built-in table through discovery.
pub fn create_command_registry() -> Result<CommandDispatcher, LainError> {
    let mut registry = CommandRegistry::new();

    registry.register("help", HelpCommand)?;
    registry.register("version", VersionCommand)?;
    let discovered = registry.discover(builtin_commands());

    tracing::info!(
        "All commands registered ({} discovered, {} total)",
        discovered,
        registry.len()
    );
    Ok(CommandDispatcher::new(Arc::new(registry)))
}
