//! The collector: single authority over which documents exist and what must
//! be recomputed after a change.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gqlwatch_config::{GqlwatchConfig, PatternMatcher};
use gqlwatch_generator::{DocumentGenerator, Generator, GeneratorError, Timestamp};
use gqlwatch_graphql::{Document, GraphQLError, LoadOptions, Schema, SchemaProvider, validate_source};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::devtools::{
    DevtoolsBroadcaster, DevtoolsEvent, DevtoolsFragment, DevtoolsOperation, DevtoolsState,
    SnapshotEntry,
};
use crate::error::CollectorError;
use crate::hooks::{CONFIG_DOCUMENTS_PATH, HookRegistry, hook_key};
use crate::prompt::{AutoPrompt, Prompt};
use crate::report::{self, ReportEntry};
use crate::templates::{BuildContext, BuildObserver, TemplateError};

/// How the collector is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Interactive development: recovery prompts, dev-tool views, errors-only report.
    Dev,
    /// One-shot build: any failure is fatal.
    #[default]
    Build,
}

impl Mode {
    pub fn is_interactive(self) -> bool {
        self == Self::Dev
    }
}

/// Path shown to users: relative to `root` when possible.
pub fn relative_path(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

pub struct Collector {
    pub(crate) config: GqlwatchConfig,
    pub(crate) mode: Mode,
    pub(crate) matcher: PatternMatcher,
    pub(crate) schema_provider: Arc<dyn SchemaProvider>,
    pub(crate) schema: Option<Arc<Schema>>,
    pub(crate) generator: Box<dyn Generator>,
    pub(crate) documents: BTreeMap<String, Document>,
    pub(crate) hooks: HookRegistry,
    /// Operation name to the timestamp at which it last passed validation.
    pub(crate) validation_cache: HashMap<String, Timestamp>,
    pub(crate) validation_count: usize,
    pub(crate) initialized: bool,
    pub(crate) prompt: Arc<dyn Prompt>,
    pub(crate) observers: Vec<Arc<dyn BuildObserver>>,
    pub(crate) devtools: DevtoolsState,
}

impl Collector {
    /// Creates a collector in build mode with the default generator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or its patterns are invalid.
    pub fn new(config: GqlwatchConfig, schema_provider: Arc<dyn SchemaProvider>) -> Result<Self> {
        config.validate()?;
        let matcher = PatternMatcher::new(&config.root_dir, &config.patterns)?
            .exclude(config.output_path())
            .exclude(config.schema_path());

        Ok(Self {
            config,
            mode: Mode::default(),
            matcher,
            schema_provider,
            schema: None,
            generator: Box::new(DocumentGenerator::new()),
            documents: BTreeMap::new(),
            hooks: HookRegistry::default(),
            validation_cache: HashMap::new(),
            validation_count: 0,
            initialized: false,
            prompt: Arc::new(AutoPrompt::new(false)),
            observers: Vec::new(),
            devtools: DevtoolsState::default(),
        })
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(mut self, observers: impl IntoIterator<Item = Arc<dyn BuildObserver>>) -> Self {
        self.observers.extend(observers);
        self
    }

    pub fn with_devtools(mut self, broadcaster: DevtoolsBroadcaster) -> Self {
        self.devtools = DevtoolsState::new(broadcaster);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &GqlwatchConfig {
        &self.config
    }

    /// Whether the first `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of schema validations run so far.
    pub fn validation_count(&self) -> usize {
        self.validation_count
    }

    /// Timestamp at which `operation` last passed validation.
    pub fn cached_timestamp(&self, operation: &str) -> Option<Timestamp> {
        self.validation_cache.get(operation).copied()
    }

    /// Keys of all tracked documents.
    pub fn document_paths(&self) -> Vec<&str> {
        self.documents.keys().map(String::as_str).collect()
    }

    pub fn contains_document(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Collects every document and runs a full build.
    ///
    /// In dev mode a failure offers one recovery cycle: reload the schema,
    /// reset and build again. A second failure is returned as is.
    pub async fn init(&mut self) -> Result<()> {
        let err = match self.try_init().await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if !self.mode.is_interactive() {
            return Err(err);
        }

        error!(error = %err, "GraphQL build failed");
        let accepted = self
            .prompt
            .confirm("GraphQL build failed. Reload the schema and revalidate?")
            .await;
        if !accepted {
            return Err(CollectorError::RecoveryDeclined {
                source: Box::new(err),
            });
        }

        let options = if self.config.schema.endpoint.is_some() {
            LoadOptions::download()
        } else {
            LoadOptions::disk()
        };
        let schema = self.schema_provider.load_schema(options).await?;
        info!("Schema reloaded, revalidating");
        self.update_schema(schema).await
    }

    pub(crate) async fn try_init(&mut self) -> Result<()> {
        let schema = self.ensure_schema().await?;
        debug!(types = schema.types().count(), "Using GraphQL schema");

        let mut paths = self.matcher.discover();
        for file in self.hooks.files() {
            if !paths.iter().any(|p| p == file) {
                paths.push(file.to_path_buf());
            }
        }

        for path in paths {
            match Document::read(&path).await {
                Ok(document) => self.track(document)?,
                Err(GraphQLError::EmptyDocument(_)) => {
                    debug!(path = %path.display(), "Skipping empty document");
                }
                Err(GraphQLError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Document not found, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(source) = self.config.static_documents() {
            self.track(Document::from_source(CONFIG_DOCUMENTS_PATH, source)?)?;
        }

        let hook_documents: Vec<(String, String)> = self
            .hooks
            .documents()
            .map(|(id, source)| (id.to_string(), source.to_string()))
            .collect();
        for (id, source) in hook_documents {
            self.track(Document::from_source(hook_key(&id), source)?)?;
        }

        info!(documents = self.documents.len(), "Collected GraphQL documents");
        self.build_state().await?;
        self.initialized = true;
        Ok(())
    }

    async fn ensure_schema(&mut self) -> Result<Arc<Schema>> {
        if let Some(schema) = &self.schema {
            return Ok(Arc::clone(schema));
        }

        let schema = match self.schema_provider.get_schema() {
            Ok(schema) => schema,
            Err(GraphQLError::SchemaNotLoaded) => {
                self.schema_provider.load_schema(LoadOptions::default()).await?
            }
            Err(e) => return Err(e.into()),
        };
        self.schema = Some(Arc::clone(&schema));
        self.generator.rebind_schema(Arc::clone(&schema));
        Ok(schema)
    }

    /// Forgets every document and all derived state.
    ///
    /// Hook documents and hook files stay registered and are replayed by the
    /// next `init`.
    pub fn reset(&mut self) {
        self.documents.clear();
        self.generator.reset();
        self.validation_cache.clear();
        self.devtools.clear();
        self.initialized = false;
        debug!("Collector reset");
    }

    /// Swaps the active schema, then resets and collects again.
    pub async fn update_schema(&mut self, schema: Arc<Schema>) -> Result<()> {
        self.schema = Some(Arc::clone(&schema));
        self.generator.rebind_schema(schema);
        self.reset();
        self.try_init().await
    }

    /// Adds or replaces a document in the map and the generator.
    pub(crate) fn track(&mut self, document: Document) -> Result<()> {
        let key = document.path().to_string();
        let result = if self.documents.contains_key(&key) {
            self.generator.update(&key, document.parsed())
        } else {
            self.generator.add(&key, document.parsed())
        };
        result.map_err(|e| self.generator_error(e))?;
        self.documents.insert(key, document);
        Ok(())
    }

    /// Removes a document. Returns false if it was not tracked.
    pub(crate) fn untrack(&mut self, key: &str) -> bool {
        if self.documents.remove(key).is_none() {
            return false;
        }
        self.generator.remove(key);
        true
    }

    /// Builds, revalidates changed operations, reports, and notifies observers.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Validation`] if any operation failed validation.
    pub async fn build_state(&mut self) -> Result<()> {
        let schema = self
            .schema
            .clone()
            .ok_or(CollectorError::GraphQL(GraphQLError::SchemaNotLoaded))?;
        let output = self.generator.build().map_err(|e| self.generator_error(e))?;
        self.validation_cache
            .retain(|name, _| output.operation(name).is_some());

        let fragments: HashMap<&str, &str> = output
            .fragments()
            .iter()
            .map(|f| (f.name.as_str(), f.source.as_str()))
            .collect();
        let log_successes = !self.mode.is_interactive() && !self.config.log_only_errors;
        let root = self.config.root_dir.clone();

        let mut entries = Vec::new();
        let mut failed = Vec::new();
        for operation in output.collected_operations() {
            if self.validation_cache.get(&operation.name) == Some(&operation.timestamp) {
                continue;
            }

            let mut source = operation.source.clone();
            for dependency in &operation.fragment_dependencies {
                source.push_str("\n\n");
                source.push_str(fragments.get(dependency.as_str()).copied().unwrap_or_default());
            }

            self.validation_count += 1;
            let errors: Vec<String> = match validate_source(&schema, &operation.path, &source) {
                Ok(errors) => errors.into_iter().map(|e| e.message).collect(),
                Err(e) => vec![e.to_string()],
            };

            if errors.is_empty() {
                self.validation_cache
                    .insert(operation.name.clone(), operation.timestamp);
            } else {
                failed.push(operation.name.clone());
            }

            if !errors.is_empty() || log_successes {
                entries.push(ReportEntry {
                    operation: operation.name.clone(),
                    kind: operation.operation_kind,
                    path: relative_path(&root, &operation.path),
                    errors,
                });
            }
        }

        report::emit(&mut entries);
        if !failed.is_empty() {
            failed.sort();
            return Err(CollectorError::Validation { failed });
        }

        let relative = move |path: &str| relative_path(&root, path);
        let context = BuildContext {
            output: &output,
            schema: &schema,
            relative: &relative,
        };
        for observer in &self.observers {
            if let Err(e) = observer.on_build(&context).await {
                return Err(self.template_error(observer.name(), e));
            }
        }

        if self.mode.is_interactive() && self.config.devtools {
            self.devtools.refresh(&output, &relative);
        }
        Ok(())
    }

    /// Renders a generator error with the offending file's content.
    pub(crate) fn generator_error(&self, err: GeneratorError) -> CollectorError {
        let mut message = err.to_string();
        if let Some(document) = self.documents.get(err.path()) {
            let _ = write!(
                message,
                "\n\n{}:\n{}",
                relative_path(&self.config.root_dir, err.path()),
                document.content().trim_end()
            );
        }
        CollectorError::Generator {
            message,
            source: err,
        }
    }

    fn template_error(&self, observer: &str, err: TemplateError) -> CollectorError {
        match err {
            TemplateError::Generator(e) => self.generator_error(e),
            other => CollectorError::template(format!("{observer}: {other}")),
        }
    }

    pub fn operations(&self) -> &[DevtoolsOperation] {
        self.devtools.operations()
    }

    pub fn fragments(&self) -> &[DevtoolsFragment] {
        self.devtools.fragments()
    }

    pub fn fragment(&self, name: &str) -> Option<&DevtoolsFragment> {
        self.devtools.fragment(name)
    }

    pub fn fragments_for_type(&self, type_name: &str) -> Vec<&DevtoolsFragment> {
        self.devtools.fragments_for_type(type_name)
    }

    /// Latest generated entry per `kind_name` key.
    pub fn devtools_snapshot(&self) -> Vec<SnapshotEntry> {
        self.devtools.snapshot()
    }

    pub fn subscribe_devtools(&self) -> broadcast::Receiver<DevtoolsEvent> {
        self.devtools.broadcaster().subscribe()
    }

    /// Registers a hook document. After the first `init` it is applied and
    /// rebuilt immediately.
    ///
    /// Unparsable sources are rejected and the previous source stays registered.
    pub async fn add_hook_document(&mut self, id: &str, source: &str) -> Result<()> {
        let document = Document::from_source(hook_key(id), source)?;
        self.hooks.add_document(id, source);
        if !self.initialized {
            return Ok(());
        }
        self.track(document)?;
        self.build_state().await
    }

    /// Resolves a possibly relative path against the project root.
    pub(crate) fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root_dir.join(path)
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("mode", &self.mode)
            .field("documents", &self.documents.len())
            .field("initialized", &self.initialized)
            .field("validation_count", &self.validation_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlwatch_graphql::StaticSchemaProvider;
    use tempfile::TempDir;

    const SDL: &str = "type User { id: ID! name: String }\ntype Query { me: User users: [User!]! }";

    fn collector(root: &Path) -> Collector {
        let provider = Arc::new(StaticSchemaProvider::new(SDL));
        Collector::new(GqlwatchConfig::with_root(root), provider).unwrap()
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/project"), "/project/src/a.graphql"),
            "src/a.graphql"
        );
        assert_eq!(relative_path(Path::new("/project"), "hook:auth"), "hook:auth");
    }

    #[tokio::test]
    async fn test_init_collects_all_sources() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("me.graphql"), "query Me { me { id } }").unwrap();
        std::fs::write(temp_dir.path().join("empty.graphql"), "").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "query X { me { id } }").unwrap();

        let provider = Arc::new(StaticSchemaProvider::new(SDL));
        let config = GqlwatchConfig::with_root(temp_dir.path())
            .with_document("query Static { users { id } }");
        let mut collector = Collector::new(config, provider).unwrap();
        collector.add_hook_document("auth", "query Hooked { me { name } }").await.unwrap();

        collector.init().await.unwrap();
        assert!(collector.is_initialized());
        assert_eq!(collector.validation_count(), 3);

        let paths = collector.document_paths();
        assert!(paths.contains(&CONFIG_DOCUMENTS_PATH));
        assert!(paths.contains(&"hook:auth"));
        assert_eq!(paths.len(), 3);
    }

    #[tokio::test]
    async fn test_build_mode_init_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("bad.graphql"), "query Bad { nope }").unwrap();

        let prompt = Arc::new(AutoPrompt::new(true));
        let mut collector = collector(temp_dir.path()).with_prompt(prompt.clone());
        let err = collector.init().await.unwrap_err();
        assert!(matches!(err, CollectorError::Validation { ref failed } if failed == &["Bad"]));
        assert_eq!(prompt.asked(), 0);
        assert!(!collector.is_initialized());
    }

    #[tokio::test]
    async fn test_init_parse_error_aborts() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.graphql"), "query {").unwrap();

        let err = collector(temp_dir.path()).init().await.unwrap_err();
        assert!(matches!(err, CollectorError::GraphQL(ref e) if e.is_parse_error()));
    }

    #[tokio::test]
    async fn test_duplicate_definition_renders_file_context() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.graphql"), "query Me { me { id } }").unwrap();
        std::fs::write(temp_dir.path().join("b.graphql"), "query Me { me { name } }").unwrap();

        let err = collector(temp_dir.path()).init().await.unwrap_err();
        let CollectorError::Generator { message, .. } = err else {
            panic!("expected generator error, got {err:?}");
        };
        assert!(message.contains("\"Me\" is defined in both"));
        assert!(message.contains("b.graphql:\nquery Me { me { name } }"));
    }
}
