//! Configuration model.
//!
//! Every option has a default, so an empty `gqlwatch.toml` is a valid
//! configuration that collects `**/*.graphql` under the current directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// When the remote schema should be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadPolicy {
    /// Download on every schema load.
    Always,
    /// Download only when no schema exists on disk yet.
    #[default]
    Once,
    /// Never download; the schema must exist on disk.
    Never,
}

impl std::fmt::Display for DownloadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Once => write!(f, "once"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// Schema source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Location of the SDL schema on disk, relative to `root_dir`.
    /// Default: "schema.graphql"
    #[serde(default = "default_schema_path")]
    pub path: PathBuf,

    /// GraphQL endpoint used to download the schema via introspection.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Download policy.
    /// Default: once
    #[serde(default)]
    pub download: DownloadPolicy,

    /// Extra HTTP headers sent with the introspection request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("schema.graphql")
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: default_schema_path(),
            endpoint: None,
            download: DownloadPolicy::default(),
            headers: BTreeMap::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set.
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level gqlwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GqlwatchConfig {
    /// Project root. Document patterns are matched relative to it and
    /// reported source paths are shown relative to it.
    /// Default: "."
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory generated artifacts are written to, relative to `root_dir`.
    /// Default: ".gqlwatch"
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Inclusion globs. Later patterns win; a leading `!` excludes.
    /// Default: ["**/*.graphql", "**/*.gql"]
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Static documents. They are concatenated into one synthetic document.
    #[serde(default)]
    pub documents: Vec<String>,

    /// Only report operations that failed validation.
    /// Default: false
    #[serde(default)]
    pub log_only_errors: bool,

    /// Materialize dev-tool views and broadcast snapshots in dev mode.
    /// Default: true
    #[serde(default = "default_devtools")]
    pub devtools: bool,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".gqlwatch")
}

fn default_patterns() -> Vec<String> {
    vec!["**/*.graphql".to_string(), "**/*.gql".to_string()]
}

fn default_devtools() -> bool {
    true
}

impl Default for GqlwatchConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            output_dir: default_output_dir(),
            patterns: default_patterns(),
            documents: Vec::new(),
            log_only_errors: false,
            devtools: default_devtools(),
            schema: SchemaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GqlwatchConfig {
    /// Creates a default configuration rooted at `root_dir`.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the inclusion patterns.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a static document.
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.documents.push(document.into());
        self
    }

    /// Resolves `root_dir` against `base` when it is relative.
    pub fn resolve_root(mut self, base: &Path) -> Self {
        if self.root_dir.is_relative() {
            self.root_dir = base.join(&self.root_dir);
        }
        self
    }

    /// Absolute location of the schema file.
    pub fn schema_path(&self) -> PathBuf {
        self.root_dir.join(&self.schema.path)
    }

    /// Absolute location of the output directory.
    pub fn output_path(&self) -> PathBuf {
        self.root_dir.join(&self.output_dir)
    }

    /// Static documents joined into the source of the synthetic config document.
    ///
    /// Returns `None` when no static documents are configured.
    pub fn static_documents(&self) -> Option<String> {
        let joined = self
            .documents
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if joined.is_empty() { None } else { Some(joined) }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.patterns.iter().any(|p| p.trim().is_empty() || p == "!") {
            return Err(ConfigError::validation("patterns must not contain empty globs"));
        }

        if self.schema.path.as_os_str().is_empty() {
            return Err(ConfigError::validation("schema.path must not be empty"));
        }

        if self.schema.download == DownloadPolicy::Always && self.schema.endpoint.is_none() {
            return Err(ConfigError::validation(
                "schema.endpoint is required when schema.download = \"always\"",
            ));
        }

        if let Some(endpoint) = &self.schema.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::validation(format!(
                "schema.endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::validation(format!(
                "logging.level must be one of trace, debug, info, warn, error; got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GqlwatchConfig::default();
        assert_eq!(config.root_dir, PathBuf::from("."));
        assert_eq!(config.patterns, vec!["**/*.graphql", "**/*.gql"]);
        assert_eq!(config.schema.download, DownloadPolicy::Once);
        assert!(config.devtools);
        assert!(!config.log_only_errors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            root_dir = "app"
            patterns = ["queries/**/*.graphql", "!queries/legacy/**"]
            documents = ["query Static { __typename }"]
            log_only_errors = true

            [schema]
            endpoint = "https://api.example.com/graphql"
            download = "always"
            headers = { Authorization = "Bearer token" }
        "#;

        let config: GqlwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("app"));
        assert_eq!(config.patterns.len(), 2);
        assert!(config.log_only_errors);
        assert_eq!(config.schema.download, DownloadPolicy::Always);
        assert_eq!(
            config.schema.headers.get("Authorization").map(String::as_str),
            Some("Bearer token")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_always_download_requires_endpoint() {
        let mut config = GqlwatchConfig::default();
        config.schema.download = DownloadPolicy::Always;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = GqlwatchConfig::default();
        config.schema.endpoint = Some("ftp://example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = GqlwatchConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let config = GqlwatchConfig::default().with_patterns(["**/*.graphql", "!"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_static_documents_joined() {
        let config = GqlwatchConfig::default()
            .with_document("query A { a }")
            .with_document("   ")
            .with_document("query B { b }\n");

        assert_eq!(
            config.static_documents().as_deref(),
            Some("query A { a }\n\nquery B { b }")
        );
        assert!(GqlwatchConfig::default().static_documents().is_none());
    }

    #[test]
    fn test_resolve_root() {
        let config = GqlwatchConfig::with_root("app").resolve_root(Path::new("/project"));
        assert_eq!(config.root_dir, PathBuf::from("/project/app"));
        assert_eq!(config.schema_path(), PathBuf::from("/project/app/schema.graphql"));

        let config = GqlwatchConfig::with_root("/abs").resolve_root(Path::new("/project"));
        assert_eq!(config.root_dir, PathBuf::from("/abs"));
    }
}
