//! AI Lab CLI - plan llama.cpp inference containers and probe GPU support

mod cli;
mod commands;
mod dry_run;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command_async(cli))
}

async fn run_command_async(cli: Cli) -> anyhow::Result<()> {
    let configuration = commands::load_configuration(cli.config.as_deref())?;

    match &cli.command {
        Commands::Plan(args) => {
            commands::plan::run(args, configuration, cli.output).await?;
        }
        Commands::Probe { all } => {
            commands::probe::run(&configuration, *all, cli.output).await?;
        }
        Commands::Images => {
            commands::images::run(&configuration, cli.output)?;
        }
    }

    Ok(())
}
