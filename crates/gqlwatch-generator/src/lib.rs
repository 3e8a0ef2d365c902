//! # gqlwatch-generator
//!
//! Turns the set of known documents into timestamped build output.
//!
//! The [`Generator`] trait is the seam the collector drives: documents are
//! added, updated and removed cheaply, and [`Generator::build`] recomputes only
//! the units whose resolved text (own source plus fragment closure) may have
//! changed. Every unit carries a [`Timestamp`] that changes exactly when that
//! resolved text changes.
//!
//! [`GeneratorOutput::emit_types`] renders the output as TypeScript
//! declarations against a schema.

mod emit;
mod error;
mod graph;
mod types;

pub use emit::operation_type_name;
pub use error::GeneratorError;
pub use graph::{DocumentGenerator, Generator};
pub use types::{
    CollectedFragment, CollectedOperation, GeneratedCode, GeneratorOutput, Timestamp, UnitKind,
};

/// Type alias for generator results.
pub type Result<T> = std::result::Result<T, GeneratorError>;
