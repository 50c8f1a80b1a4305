//! Entry point for the `able-seaman` binary.

use std::process::ExitCode;

use clap::Parser;
use seaman_cli::{commands, Cli, CliError, Command};
use seaman_executor::Manager;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let mut stdout = std::io::stdout();

    if let Command::Package(args) = &cli.command {
        return commands::package(args, &mut stdout);
    }

    let manager = Manager::connect(cli.manager_config()).await?;
    commands::execute(&manager, &cli.command, &mut stdout).await
}
