use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gqlwatch_config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "gqlwatch")]
#[command(about = "Collect, validate and generate types for GraphQL documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log level (overrides the configuration file and RUST_LOG)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every document and write generated artifacts
    Build,
    /// Build, then watch for changes and rebuild incrementally
    Dev(DevArgs),
    /// Validate every document without writing artifacts
    Validate,
    /// Download the schema from the configured endpoint
    DownloadSchema,
}

#[derive(clap::Args)]
pub struct DevArgs {
    /// Ignore repeated events for the same path within this window
    #[arg(long, default_value_t = 50)]
    pub debounce_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dev() {
        let cli = Cli::parse_from(["gqlwatch", "dev", "--debounce-ms", "10", "-l", "debug"]);
        assert!(matches!(cli.command, Commands::Dev(DevArgs { debounce_ms: 10 })));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_download_schema() {
        let cli = Cli::parse_from(["gqlwatch", "download-schema", "--config", "api/gqlwatch.toml"]);
        assert!(matches!(cli.command, Commands::DownloadSchema));
        assert_eq!(cli.config, PathBuf::from("api/gqlwatch.toml"));
    }
}
