//! GraphQL building blocks for gqlwatch.
//!
//! - [`document`]: source documents split into operation and fragment definitions
//! - [`schema`]: the indexed schema and the providers that load it
//! - [`validation`]: operation validation against the schema

pub mod document;
pub mod error;
pub mod schema;
mod split;
pub mod validation;

pub use document::{
    Definition, DefinitionKind, Document, OperationKind, ParsedDocument, parse_executable, path_key,
};
pub use error::GraphQLError;
pub use schema::{
    FileSchemaProvider, LoadOptions, RemoteSchemaProvider, Schema, SchemaProvider,
    StaticSchemaProvider, provider_for,
};
pub use validation::{Location, ValidationError, validate, validate_source};

/// Result type for document and schema operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;
