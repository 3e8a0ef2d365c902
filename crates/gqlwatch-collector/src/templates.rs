//! Build observers that materialize artifacts after each successful build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gqlwatch_generator::{GeneratorError, GeneratorOutput};
use gqlwatch_graphql::{OperationKind, Schema};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised by build observers.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What an observer receives after a successful build.
pub struct BuildContext<'a> {
    pub output: &'a GeneratorOutput,
    pub schema: &'a Arc<Schema>,
    /// Maps a document path to the path shown to users.
    pub relative: &'a (dyn Fn(&str) -> String + Send + Sync),
}

/// Reacts to completed builds.
#[async_trait]
pub trait BuildObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn on_build(&self, context: &BuildContext<'_>) -> Result<(), TemplateError>;
}

async fn write_artifact(path: &Path, contents: &str) -> Result<(), TemplateError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Identical artifacts are not rewritten.
    if tokio::fs::read_to_string(path).await.ok().as_deref() == Some(contents) {
        return Ok(());
    }
    tokio::fs::write(path, contents).await?;
    debug!(path = %path.display(), "Artifact written");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    operation_kind: OperationKind,
    source: String,
    fragment_dependencies: Vec<String>,
    path: String,
}

/// Writes `operations.json`: every operation with its fully resolved source.
#[derive(Debug, Clone)]
pub struct OperationsManifest {
    path: PathBuf,
}

impl OperationsManifest {
    pub const FILE_NAME: &'static str = "operations.json";

    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BuildObserver for OperationsManifest {
    fn name(&self) -> &str {
        "operations-manifest"
    }

    async fn on_build(&self, context: &BuildContext<'_>) -> Result<(), TemplateError> {
        let manifest: BTreeMap<&str, ManifestEntry> = context
            .output
            .collected_operations()
            .iter()
            .map(|op| {
                (
                    op.name.as_str(),
                    ManifestEntry {
                        operation_kind: op.operation_kind,
                        source: context
                            .output
                            .resolved_source(&op.source, &op.fragment_dependencies),
                        fragment_dependencies: op.fragment_dependencies.clone(),
                        path: (context.relative)(&op.path),
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&manifest)?;
        write_artifact(&self.path, &json).await
    }
}

/// Writes `operations.d.ts` with TypeScript types for every operation and fragment.
#[derive(Debug, Clone)]
pub struct TypesTemplate {
    path: PathBuf,
}

impl TypesTemplate {
    pub const FILE_NAME: &'static str = "operations.d.ts";

    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BuildObserver for TypesTemplate {
    fn name(&self) -> &str {
        "types"
    }

    async fn on_build(&self, context: &BuildContext<'_>) -> Result<(), TemplateError> {
        let types = context.output.emit_types(context.schema)?;
        write_artifact(&self.path, &types).await
    }
}

/// The default observers writing into `output_dir`.
pub fn default_observers(output_dir: impl AsRef<Path>) -> Vec<Arc<dyn BuildObserver>> {
    vec![
        Arc::new(OperationsManifest::new(output_dir.as_ref())),
        Arc::new(TypesTemplate::new(output_dir.as_ref())),
    ]
}
