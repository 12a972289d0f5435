use clap::Parser;
use lain::app::Application;
use lain::cli::Args;
use lain::commands::create_command_registry;
use lain::config::{Config, Overrides};
use lain::core::error::LainError;
use lain::display;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // Logs go to stderr so streamed replies on stdout stay clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn build_app(args: Args, cancel: CancellationToken) -> Result<Application, LainError> {
    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_or_init(&config_path)?;
    config.apply(Overrides::from_env().merge(args.overrides()));

    let command_dispatcher = create_command_registry()?;
    Ok(Application::new(args, config, command_dispatcher, cancel))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let app = match build_app(args, cancel) {
        Ok(app) => app,
        Err(e) => {
            tracing::debug!("Startup failed: {}", e);
            display::display_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            app.report(&e);
            ExitCode::FAILURE
        }
    }
}
