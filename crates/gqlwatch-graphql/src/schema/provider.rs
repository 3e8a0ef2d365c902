//! Schema providers.
//!
//! A provider owns the current schema behind an `ArcSwapOption`, so readers
//! take a cheap snapshot while a reload swaps the pointer atomically. Callers
//! never learn how the schema was obtained; failures surface as
//! [`GraphQLError`]s they can turn into a recovery prompt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use gqlwatch_config::{DownloadPolicy, GqlwatchConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};

use super::Schema;
use super::introspection::{INTROSPECTION_QUERY, IntrospectionResponse, render_sdl};
use crate::error::GraphQLError;

/// Flags forcing where `load_schema` takes the schema from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Download even if a schema exists on disk.
    pub force_download: bool,
    /// Read from disk even if the policy would download.
    pub force_disk: bool,
}

impl LoadOptions {
    pub fn download() -> Self {
        Self {
            force_download: true,
            force_disk: false,
        }
    }

    pub fn disk() -> Self {
        Self {
            force_download: false,
            force_disk: true,
        }
    }
}

/// Source of the active GraphQL schema.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Returns the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::SchemaNotLoaded`] if the schema was never loaded.
    fn get_schema(&self) -> Result<Arc<Schema>, GraphQLError>;

    /// Populates or replaces the schema and returns the new one.
    async fn load_schema(&self, options: LoadOptions) -> Result<Arc<Schema>, GraphQLError>;

    /// Whether a schema file exists on disk.
    fn has_schema_on_disk(&self) -> bool;
}

/// Schema loaded from an SDL file on disk.
pub struct FileSchemaProvider {
    path: PathBuf,
    current: ArcSwapOption<Schema>,
}

impl FileSchemaProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: ArcSwapOption::empty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_disk(&self) -> Result<Arc<Schema>, GraphQLError> {
        debug!(path = %self.path.display(), "Reading GraphQL schema from disk");
        let sdl = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GraphQLError::schema_parse(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Ok(self.store(Schema::parse(sdl)?))
    }

    fn store(&self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.current.store(Some(Arc::clone(&schema)));
        schema
    }
}

#[async_trait]
impl SchemaProvider for FileSchemaProvider {
    fn get_schema(&self) -> Result<Arc<Schema>, GraphQLError> {
        self.current.load_full().ok_or(GraphQLError::SchemaNotLoaded)
    }

    async fn load_schema(&self, options: LoadOptions) -> Result<Arc<Schema>, GraphQLError> {
        if options.force_download && !options.force_disk {
            return Err(GraphQLError::schema_download(
                "no schema endpoint configured",
            ));
        }
        self.read_disk().await
    }

    fn has_schema_on_disk(&self) -> bool {
        self.path.is_file()
    }
}

/// Schema downloaded from a GraphQL endpoint via introspection and cached on disk.
pub struct RemoteSchemaProvider {
    disk: FileSchemaProvider,
    endpoint: String,
    policy: DownloadPolicy,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl RemoteSchemaProvider {
    pub fn new(path: impl Into<PathBuf>, endpoint: impl Into<String>) -> Self {
        Self {
            disk: FileSchemaProvider::new(path),
            endpoint: endpoint.into(),
            policy: DownloadPolicy::default(),
            headers: BTreeMap::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_policy(mut self, policy: DownloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Downloads the schema, writes the SDL to disk and parses it.
    pub async fn download(&self) -> Result<Arc<Schema>, GraphQLError> {
        info!(endpoint = %self.endpoint, "Downloading GraphQL schema");

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.header_map()?)
            .json(&serde_json::json!({ "query": INTROSPECTION_QUERY }))
            .send()
            .await?
            .error_for_status()?
            .json::<IntrospectionResponse>()
            .await?;

        let sdl = render_sdl(response.into_schema()?);
        let schema = Schema::parse(sdl)?;

        if let Some(parent) = self.disk.path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(self.disk.path(), schema.sdl()).await?;
        info!(path = %self.disk.path().display(), "GraphQL schema saved");

        Ok(self.disk.store(schema))
    }

    fn header_map(&self) -> Result<HeaderMap, GraphQLError> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GraphQLError::schema_download(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GraphQLError::schema_download(format!("header {name}: {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn should_download(&self, options: LoadOptions) -> bool {
        if options.force_disk {
            return false;
        }
        if options.force_download {
            return true;
        }
        match self.policy {
            DownloadPolicy::Always => true,
            DownloadPolicy::Once => !self.disk.has_schema_on_disk(),
            DownloadPolicy::Never => false,
        }
    }
}

impl RemoteSchemaProvider {
    /// Remote provider for a project, if it configures an endpoint. The SDL
    /// file is resolved against the project root.
    pub fn from_config(config: &GqlwatchConfig) -> Option<Self> {
        config.schema.endpoint.as_ref().map(|endpoint| {
            Self::new(config.schema_path(), endpoint)
                .with_policy(config.schema.download)
                .with_headers(config.schema.headers.clone())
        })
    }
}

/// Provider for a project: remote when an endpoint is configured, otherwise
/// the SDL file on disk.
pub fn provider_for(config: &GqlwatchConfig) -> Arc<dyn SchemaProvider> {
    match RemoteSchemaProvider::from_config(config) {
        Some(remote) => Arc::new(remote),
        None => Arc::new(FileSchemaProvider::new(config.schema_path())),
    }
}

#[async_trait]
impl SchemaProvider for RemoteSchemaProvider {
    fn get_schema(&self) -> Result<Arc<Schema>, GraphQLError> {
        self.disk.get_schema()
    }

    async fn load_schema(&self, options: LoadOptions) -> Result<Arc<Schema>, GraphQLError> {
        if self.should_download(options) {
            self.download().await
        } else {
            self.disk.read_disk().await
        }
    }

    fn has_schema_on_disk(&self) -> bool {
        self.disk.has_schema_on_disk()
    }
}

/// Schema held in memory. Replacing the SDL simulates schema drift.
pub struct StaticSchemaProvider {
    sdl: std::sync::RwLock<String>,
    current: ArcSwapOption<Schema>,
}

impl StaticSchemaProvider {
    pub fn new(sdl: impl Into<String>) -> Self {
        Self {
            sdl: std::sync::RwLock::new(sdl.into()),
            current: ArcSwapOption::empty(),
        }
    }

    /// Replaces the SDL served by the next `load_schema`.
    pub fn set_sdl(&self, sdl: impl Into<String>) {
        if let Ok(mut guard) = self.sdl.write() {
            *guard = sdl.into();
        }
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    fn get_schema(&self) -> Result<Arc<Schema>, GraphQLError> {
        self.current.load_full().ok_or(GraphQLError::SchemaNotLoaded)
    }

    async fn load_schema(&self, _options: LoadOptions) -> Result<Arc<Schema>, GraphQLError> {
        let sdl = self
            .sdl
            .read()
            .map_err(|_| GraphQLError::schema_parse("schema source lock poisoned"))?
            .clone();
        let schema = Arc::new(Schema::parse(sdl)?);
        self.current.store(Some(Arc::clone(&schema)));
        Ok(schema)
    }

    fn has_schema_on_disk(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::TEST_SDL;
    use gqlwatch_config::SchemaConfig;
    use tempfile::TempDir;
    use tokio_test::block_on;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn introspection_body() -> serde_json::Value {
        serde_json::json!({
            "data": {
                "__schema": {
                    "queryType": { "name": "Query" },
                    "mutationType": null,
                    "subscriptionType": null,
                    "types": [
                        {
                            "kind": "OBJECT",
                            "name": "Query",
                            "fields": [{
                                "name": "hello",
                                "args": [{
                                    "name": "name",
                                    "type": { "kind": "SCALAR", "name": "String", "ofType": null },
                                    "defaultValue": null
                                }],
                                "type": {
                                    "kind": "NON_NULL", "name": null,
                                    "ofType": { "kind": "SCALAR", "name": "String", "ofType": null }
                                }
                            }],
                            "inputFields": null,
                            "interfaces": [],
                            "enumValues": null,
                            "possibleTypes": null
                        },
                        {
                            "kind": "SCALAR", "name": "String", "fields": null,
                            "inputFields": null, "interfaces": null,
                            "enumValues": null, "possibleTypes": null
                        }
                    ],
                    "directives": []
                }
            }
        })
    }

    #[tokio::test]
    async fn test_get_schema_before_load() {
        let provider = FileSchemaProvider::new("/nonexistent/schema.graphql");
        assert!(matches!(
            provider.get_schema(),
            Err(GraphQLError::SchemaNotLoaded)
        ));
        assert!(!provider.has_schema_on_disk());
    }

    #[tokio::test]
    async fn test_file_provider_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("schema.graphql");
        std::fs::write(&path, TEST_SDL).unwrap();

        let provider = FileSchemaProvider::new(&path);
        assert!(provider.has_schema_on_disk());

        let schema = provider.load_schema(LoadOptions::default()).await.unwrap();
        assert!(schema.get_type("User").is_some());
        assert!(Arc::ptr_eq(&schema, &provider.get_schema().unwrap()));
    }

    #[tokio::test]
    async fn test_file_provider_cannot_download() {
        let provider = FileSchemaProvider::new("/nonexistent/schema.graphql");
        let err = provider.load_schema(LoadOptions::download()).await.unwrap_err();
        assert!(err.is_schema_error());
    }

    #[tokio::test]
    async fn test_file_provider_missing_file_is_schema_error() {
        let provider = FileSchemaProvider::new("/nonexistent/schema.graphql");
        let err = provider.load_schema(LoadOptions::default()).await.unwrap_err();
        assert!(err.is_schema_error());
    }

    #[tokio::test]
    async fn test_remote_provider_downloads_and_saves() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(introspection_body()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let schema_path = temp_dir.path().join("nested/schema.graphql");
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());

        let provider = RemoteSchemaProvider::new(&schema_path, format!("{}/graphql", server.uri()))
            .with_headers(headers);

        let schema = provider.load_schema(LoadOptions::default()).await.unwrap();
        assert!(schema.field("Query", "hello").is_some());
        assert!(provider.has_schema_on_disk());

        let saved = std::fs::read_to_string(&schema_path).unwrap();
        assert!(saved.contains("hello(name: String): String!"));

        // Policy "once": the schema exists now, so the next load reads disk
        let again = provider.load_schema(LoadOptions::default()).await.unwrap();
        assert!(again.field("Query", "hello").is_some());
    }

    #[tokio::test]
    async fn test_remote_provider_force_disk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let schema_path = temp_dir.path().join("schema.graphql");
        std::fs::write(&schema_path, TEST_SDL).unwrap();

        let provider = RemoteSchemaProvider::new(&schema_path, server.uri())
            .with_policy(DownloadPolicy::Always);
        let schema = provider.load_schema(LoadOptions::disk()).await.unwrap();
        assert!(schema.get_type("Post").is_some());
    }

    #[tokio::test]
    async fn test_remote_provider_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let provider =
            RemoteSchemaProvider::new(temp_dir.path().join("schema.graphql"), server.uri());

        let err = provider.load_schema(LoadOptions::download()).await.unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_static_provider_swap() {
        let provider = StaticSchemaProvider::new("type Query { a: Int }");
        let first = block_on(provider.load_schema(LoadOptions::default())).unwrap();
        assert!(first.field("Query", "a").is_some());

        provider.set_sdl("type Query { b: Int }");
        let second = block_on(provider.load_schema(LoadOptions::default())).unwrap();
        assert!(second.field("Query", "a").is_none());
        assert!(second.field("Query", "b").is_some());

        // Old snapshots stay valid
        assert!(first.field("Query", "a").is_some());
    }

    #[test]
    fn test_provider_from_config() {
        let config = GqlwatchConfig::with_root("/project");
        assert!(RemoteSchemaProvider::from_config(&config).is_none());
        assert!(!provider_for(&config).has_schema_on_disk());

        let mut config = GqlwatchConfig::with_root("/project");
        config.schema = SchemaConfig {
            endpoint: Some("https://api.example.com/graphql".into()),
            download: DownloadPolicy::Never,
            ..Default::default()
        };
        let provider = RemoteSchemaProvider::from_config(&config).unwrap();
        assert_eq!(provider.policy, DownloadPolicy::Never);
        assert_eq!(provider.disk.path(), Path::new("/project/schema.graphql"));
    }
}
