mod cli;
mod commands;
mod observability;
mod output;
mod watcher;

use anyhow::{Context, Result};
use clap::Parser;
use gqlwatch_config::{GqlwatchConfig, load_config};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or("info"));

    let config = load(&cli)?;
    if cli.log_level.is_none() {
        observability::apply_logging_level(&config.logging.level);
    }

    match &cli.command {
        Commands::Build => commands::build(&config).await?,
        Commands::Dev(args) => commands::dev(&config, args).await?,
        Commands::Validate => commands::validate(&config).await?,
        Commands::DownloadSchema => commands::download_schema(&config).await?,
    }

    Ok(())
}

/// Loads the configuration with an absolute project root, so watcher paths
/// and document keys agree.
fn load(cli: &Cli) -> Result<GqlwatchConfig> {
    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.root_dir = config
        .root_dir
        .canonicalize()
        .with_context(|| format!("project root {} does not exist", config.root_dir.display()))?;
    Ok(config)
}
