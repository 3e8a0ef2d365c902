//! Build output types.

use std::fmt;

use gqlwatch_graphql::OperationKind;
use serde::{Deserialize, Serialize};

/// Whether a unit is a fragment or an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Fragment,
    Operation,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment => write!(f, "fragment"),
            Self::Operation => write!(f, "operation"),
        }
    }
}

/// Opaque change token.
///
/// Two builds report the same timestamp for a unit only if its resolved text
/// (own source plus fragment closure) is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub(crate) u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One generated unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCode {
    pub kind: UnitKind,
    pub graphql_name: String,
    /// Own source text, no dependencies inlined.
    pub source: String,
    /// Transitive fragment closure in first-use order, dangling names included.
    pub fragment_dependencies: Vec<String>,
    pub timestamp: Timestamp,
    pub path: String,
}

impl GeneratedCode {
    /// Key used by dev-tool snapshots: `kind_name`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.kind, self.graphql_name)
    }
}

/// An operation as seen by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedOperation {
    pub name: String,
    pub operation_kind: OperationKind,
    /// Bare operation source.
    pub source: String,
    pub fragment_dependencies: Vec<String>,
    pub timestamp: Timestamp,
    pub path: String,
}

/// A fragment as seen by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedFragment {
    pub name: String,
    pub type_condition: String,
    pub source: String,
    pub fragment_dependencies: Vec<String>,
    pub timestamp: Timestamp,
    pub path: String,
}

/// Result of [`Generator::build`](crate::Generator::build).
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    pub(crate) operations: Vec<CollectedOperation>,
    pub(crate) fragments: Vec<CollectedFragment>,
    pub(crate) code: Vec<GeneratedCode>,
}

impl GeneratorOutput {
    /// Operations sorted by name.
    pub fn collected_operations(&self) -> &[CollectedOperation] {
        &self.operations
    }

    /// Fragments sorted by name.
    pub fn fragments(&self) -> &[CollectedFragment] {
        &self.fragments
    }

    /// All generated units, fragments first.
    pub fn generated_code(&self) -> &[GeneratedCode] {
        &self.code
    }

    pub fn operation(&self, name: &str) -> Option<&CollectedOperation> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn fragment(&self, name: &str) -> Option<&CollectedFragment> {
        self.fragments.iter().find(|f| f.name == name)
    }

    /// Source of `name` followed by the sources of its fragment closure.
    ///
    /// Dangling fragment names contribute nothing.
    pub fn resolved_source(&self, own_source: &str, dependencies: &[String]) -> String {
        let mut text = own_source.to_string();
        for dependency in dependencies {
            if let Some(fragment) = self.fragment(dependency) {
                text.push_str("\n\n");
                text.push_str(&fragment.source);
            }
        }
        text
    }
}
