//! Incremental handling of file-system changes and hook updates.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use gqlwatch_generator::Timestamp;
use gqlwatch_graphql::{Document, GraphQLError, path_key};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::collector::Collector;
use crate::error::CollectorError;
use crate::hooks::hook_key;

/// File-system change kinds understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
    UnlinkDir,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Change => write!(f, "change"),
            Self::Unlink => write!(f, "unlink"),
            Self::UnlinkDir => write!(f, "unlinkDir"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchError {
    pub message: String,
}

impl From<&CollectorError> for WatchError {
    fn from(err: &CollectorError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Outcome of one incremental update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEventResult {
    /// Whether any state changed.
    pub has_changed: bool,
    /// Operations whose validation state changed, sorted.
    pub affected_operations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WatchError>,
}

impl WatchEventResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn failure(err: &CollectorError) -> Self {
        Self {
            has_changed: false,
            affected_operations: Vec::new(),
            error: Some(err.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl Collector {
    /// Applies one file-system change and rebuilds if anything changed.
    ///
    /// Relative paths are resolved against the project root. Errors are
    /// reported in the result, never returned.
    pub async fn handle_watch_event(&mut self, kind: WatchEventKind, path: &Path) -> WatchEventResult {
        let path = self.absolute(path);
        debug!(%kind, path = %path.display(), "Watch event");

        let before = self.validation_cache.clone();
        let outcome = match kind {
            WatchEventKind::Add | WatchEventKind::Change => self.apply_write(&path).await,
            WatchEventKind::Unlink => Ok(self.untrack(&path_key(&path))),
            WatchEventKind::UnlinkDir => Ok(self.remove_folder(&path)),
        };
        self.finish_event(before, outcome).await
    }

    /// Registers or overwrites a hook document and applies it immediately.
    ///
    /// An unparsable source is reported and not registered, so later builds
    /// keep using the previous one.
    pub async fn add_or_update_hook_document(&mut self, id: &str, source: &str) -> WatchEventResult {
        let document = match Document::from_source(hook_key(id), source) {
            Ok(document) => document,
            Err(e) => return self.fail_event(e.into()),
        };
        if !self.hooks.add_document(id, source) && self.contains_document(&hook_key(id)) {
            return WatchEventResult::unchanged();
        }
        if !self.initialized {
            return WatchEventResult::unchanged();
        }

        let before = self.validation_cache.clone();
        let outcome = self.track(document).map(|()| true);
        self.finish_event(before, outcome).await
    }

    /// Registers a file that is always collected, even outside the patterns.
    pub async fn add_hook_file(&mut self, path: impl Into<PathBuf>) -> WatchEventResult {
        let path: PathBuf = path.into();
        let path = self.absolute(&path);
        if !self.hooks.add_file(path.clone()) || !self.initialized {
            return WatchEventResult::unchanged();
        }
        self.handle_watch_event(WatchEventKind::Add, &path).await
    }

    /// Add and change share one path: a tracked document is refreshed, an
    /// untracked one is read and added.
    async fn apply_write(&mut self, path: &Path) -> Result<bool> {
        let key = path_key(path);
        if self.documents.contains_key(&key) {
            return self.refresh_tracked(&key).await;
        }
        if !self.matcher.is_match(path) && !self.hooks.contains_file(path) {
            return Ok(false);
        }

        match Document::read(path).await {
            Ok(document) => {
                self.track(document)?;
                Ok(true)
            }
            Err(GraphQLError::EmptyDocument(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_tracked(&mut self, key: &str) -> Result<bool> {
        let Some(document) = self.documents.get_mut(key) else {
            return Ok(false);
        };

        match document.refresh().await {
            Ok(false) => Ok(false),
            Ok(true) => {
                let result = self.generator.update(key, document.parsed());
                result.map_err(|e| self.generator_error(e))?;
                Ok(true)
            }
            Err(e) => {
                warn!(path = key, error = %e, "Document could not be refreshed, evicting");
                self.untrack(key);
                Ok(true)
            }
        }
    }

    /// Removes every document under `folder`. Matching is by path component.
    fn remove_folder(&mut self, folder: &Path) -> bool {
        let keys: Vec<String> = self
            .documents
            .keys()
            .filter(|key| Path::new(key.as_str()).starts_with(folder))
            .cloned()
            .collect();
        for key in &keys {
            self.untrack(key);
        }
        !keys.is_empty()
    }

    async fn finish_event(
        &mut self,
        before: HashMap<String, Timestamp>,
        outcome: Result<bool>,
    ) -> WatchEventResult {
        let changed = match outcome {
            Ok(changed) => changed,
            Err(e) => return self.fail_event(e),
        };
        if !changed {
            return WatchEventResult::unchanged();
        }
        if let Err(e) = self.build_state().await {
            return self.fail_event(e);
        }

        let mut affected: Vec<String> = self
            .validation_cache
            .iter()
            .filter(|(name, timestamp)| before.get(*name) != Some(*timestamp))
            .map(|(name, _)| name.clone())
            .chain(
                before
                    .keys()
                    .filter(|name| !self.validation_cache.contains_key(*name))
                    .cloned(),
            )
            .collect();
        affected.sort();
        affected.dedup();

        WatchEventResult {
            has_changed: true,
            affected_operations: affected,
            error: None,
        }
    }

    fn fail_event(&mut self, err: CollectorError) -> WatchEventResult {
        if !err.is_validation_error() {
            self.generator.reset_caches();
        }
        warn!(error = %err, "Incremental update failed");
        WatchEventResult::failure(&err)
    }
}
