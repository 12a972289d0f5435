use super::{CommandContext, CommandHandler};
use crate::core::error::LainError;
use crate::display;
use async_trait::async_trait;

pub const VERSION_LINE: &str = concat!("Lain CLI version ", env!("CARGO_PKG_VERSION"));

pub struct HelpCommand;
pub struct VersionCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> Result<(), LainError> {
        display::display_command_list(&ctx.registry.descriptions());
        Ok(())
    }

    fn usage(&self) -> &'static str {
        "lain help"
    }

    fn description(&self) -> &'static str {
        "Show available commands"
    }
}

#[async_trait]
impl CommandHandler for VersionCommand {
    async fn execute(&self, _ctx: &CommandContext, _args: &[String]) -> Result<(), LainError> {
        println!("{}", VERSION_LINE);
        println!("Released under the Artistic License 2.0");
        tracing::info!("Version command executed: {}", VERSION_LINE);
        Ok(())
    }

    fn usage(&self) -> &'static str {
        "lain version"
    }

    fn description(&self) -> &'static str {
        "Show version information"
    }
}
