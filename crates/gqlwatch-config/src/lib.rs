//! Configuration for gqlwatch.
//!
//! This crate provides:
//! - The [`GqlwatchConfig`] model loaded from `gqlwatch.toml`
//! - Defaults and validation for every option the collector consumes
//! - [`PatternMatcher`], which decides whether a path is an included document
//!   and discovers all included documents under the project root
//!
//! # Example
//!
//! ```toml
//! root_dir = "."
//! patterns = ["**/*.graphql", "!**/legacy/**"]
//!
//! [schema]
//! path = "schema.graphql"
//! endpoint = "https://api.example.com/graphql"
//! download = "once"
//! ```

pub mod loader;
pub mod patterns;
pub mod settings;

pub use loader::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, load_config};
pub use patterns::PatternMatcher;
pub use settings::{DownloadPolicy, GqlwatchConfig, LoggingConfig, SchemaConfig};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
