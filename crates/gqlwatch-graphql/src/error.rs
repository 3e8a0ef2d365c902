//! Error types for document and schema operations.

use thiserror::Error;

/// Errors that can occur while reading documents or loading the schema.
#[derive(Debug, Error)]
pub enum GraphQLError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document is not syntactically valid GraphQL.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// A document contains no definitions.
    #[error("Document {0} is empty")]
    EmptyDocument(String),

    /// The schema was requested before it was ever loaded.
    #[error("GraphQL schema has not been loaded")]
    SchemaNotLoaded,

    /// The schema SDL is unparsable or structurally unusable.
    #[error("Invalid GraphQL schema: {0}")]
    SchemaParse(String),

    /// The schema could not be downloaded.
    #[error("Failed to download GraphQL schema: {0}")]
    SchemaDownload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphQLError {
    /// Create a new Parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new SchemaParse error
    pub fn schema_parse(message: impl Into<String>) -> Self {
        Self::SchemaParse(message.into())
    }

    /// Create a new SchemaDownload error
    pub fn schema_download(message: impl Into<String>) -> Self {
        Self::SchemaDownload(message.into())
    }

    /// Returns true if the error concerns the schema rather than a document.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaNotLoaded | Self::SchemaParse(_) | Self::SchemaDownload(_) | Self::Http(_)
        )
    }

    /// Returns true if the error is a document parse failure.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::EmptyDocument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(GraphQLError::SchemaNotLoaded.is_schema_error());
        assert!(GraphQLError::schema_download("offline").is_schema_error());
        assert!(!GraphQLError::parse("a.graphql", "bad").is_schema_error());
        assert!(GraphQLError::parse("a.graphql", "bad").is_parse_error());
        assert!(GraphQLError::EmptyDocument("a.graphql".into()).is_parse_error());
    }

    #[test]
    fn test_display() {
        let err = GraphQLError::parse("queries/user.graphql", "unexpected token");
        assert_eq!(
            err.to_string(),
            "Failed to parse queries/user.graphql: unexpected token"
        );
    }
}
