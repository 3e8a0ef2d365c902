//! Collector error types.

use gqlwatch_config::ConfigError;
use gqlwatch_generator::GeneratorError;
use gqlwatch_graphql::GraphQLError;
use thiserror::Error;

/// Errors surfaced by the collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// One or more operations failed schema validation. Partial output is unusable.
    #[error("GraphQL validation failed for {}", failed.join(", "))]
    Validation { failed: Vec<String> },

    /// Structural generator error, rendered with the offending file's content.
    #[error("{message}")]
    Generator {
        message: String,
        #[source]
        source: GeneratorError,
    },

    #[error(transparent)]
    GraphQL(#[from] GraphQLError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A build observer failed to write its artifact.
    #[error("Template error: {0}")]
    Template(String),

    /// The initial build failed and the user declined to revalidate.
    #[error("Initial build failed and recovery was declined: {source}")]
    RecoveryDeclined {
        #[source]
        source: Box<CollectorError>,
    },

    /// The collector service is no longer running.
    #[error("Collector service stopped")]
    ServiceStopped,
}

impl CollectorError {
    /// Create a new Template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Returns true if the error is the build-failure signal of failed validation.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true if the schema is unreachable or unusable.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        match self {
            Self::GraphQL(e) => e.is_schema_error(),
            Self::RecoveryDeclined { source } => source.is_schema_error(),
            _ => false,
        }
    }
}
