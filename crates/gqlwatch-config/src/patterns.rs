//! Document inclusion patterns.
//!
//! Patterns follow gitignore-style override semantics: a plain glob includes
//! matching files, a glob prefixed with `!` excludes them, and the last
//! matching pattern wins.

use std::path::{Path, PathBuf};

use ignore::overrides::{Override, OverrideBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{ConfigError, Result};

/// Directory names never descended into during discovery.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "target"];

/// Matches and discovers GraphQL documents under a project root.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    root: PathBuf,
    overrides: Override,
    skipped: Vec<PathBuf>,
}

impl PatternMatcher {
    /// Compiles `patterns` relative to `root`.
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let root = root.into();
        let mut builder = OverrideBuilder::new(&root);

        for pattern in patterns {
            builder
                .add(pattern)
                .map_err(|e| ConfigError::pattern(pattern, e.to_string()))?;
        }

        let overrides = builder
            .build()
            .map_err(|e| ConfigError::pattern(patterns.join(", "), e.to_string()))?;

        Ok(Self {
            root,
            overrides,
            skipped: Vec::new(),
        })
    }

    /// Excludes a file or directory (the schema file, the output directory)
    /// from matching and discovery.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.skipped.push(path.into());
        self
    }

    /// The project root patterns are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if `path` is an included document.
    ///
    /// Paths outside the root, under an excluded path or inside a directory
    /// discovery never enters do not match.
    pub fn is_match(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if self.skipped.iter().any(|s| path.starts_with(s)) || in_skipped_dir(relative) {
            return false;
        }
        self.overrides.matched(path, false).is_whitelist()
    }

    /// Walks the root and returns every included file, sorted.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e.path(), e.file_type().is_dir()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry during discovery: {e}");
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_match(entry.path()) {
                found.push(entry.into_path());
            }
        }

        found.sort();
        debug!(root = %self.root.display(), count = found.len(), "Discovered documents");
        found
    }

    fn is_skipped(&self, path: &Path, is_dir: bool) -> bool {
        if self.skipped.iter().any(|s| s == path) {
            return true;
        }
        if !is_dir {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
    }
}

fn in_skipped_dir(relative: &Path) -> bool {
    relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| c.as_os_str().to_str())
        .any(|name| SKIPPED_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "query Q { a }").unwrap();
        path
    }

    #[test]
    fn test_positive_and_negative_patterns() {
        let root = PathBuf::from("/project");
        let matcher =
            PatternMatcher::new(&root, &patterns(&["**/*.graphql", "!**/legacy/**"])).unwrap();

        assert!(matcher.is_match(Path::new("/project/queries/user.graphql")));
        assert!(!matcher.is_match(Path::new("/project/queries/legacy/old.graphql")));
        assert!(!matcher.is_match(Path::new("/project/queries/user.ts")));
        assert!(!matcher.is_match(Path::new("/elsewhere/user.graphql")));
    }

    #[test]
    fn test_skipped_dirs_never_match() {
        let matcher = PatternMatcher::new("/project", &patterns(&["**/*.graphql"])).unwrap();

        assert!(!matcher.is_match(Path::new("/project/node_modules/pkg/me.graphql")));
        assert!(!matcher.is_match(Path::new("/project/web/node_modules/me.graphql")));
        assert!(!matcher.is_match(Path::new("/project/.git/me.graphql")));
        assert!(!matcher.is_match(Path::new("/project/target/debug/me.graphql")));
        assert!(matcher.is_match(Path::new("/project/targets/me.graphql")));
        assert!(matcher.is_match(Path::new("/project/target.graphql")));
    }

    #[test]
    fn test_no_patterns_matches_nothing() {
        let matcher = PatternMatcher::new("/project", &[]).unwrap();
        assert!(!matcher.is_match(Path::new("/project/a.graphql")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternMatcher::new("/project", &patterns(&["**/[.graphql"])).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_discover() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let a = touch(root, "a.graphql");
        let b = touch(root, "nested/deep/b.graphql");
        touch(root, "nested/ignored.txt");
        touch(root, "node_modules/pkg/c.graphql");
        touch(root, "out/d.graphql");
        touch(root, "legacy/e.graphql");
        let schema = touch(root, "schema.graphql");

        let matcher = PatternMatcher::new(root, &patterns(&["**/*.graphql", "!legacy/**"]))
            .unwrap()
            .exclude(root.join("out"))
            .exclude(&schema);

        assert_eq!(matcher.discover(), vec![a, b]);
        assert!(!matcher.is_match(&schema));
        assert!(!matcher.is_match(&root.join("out/d.graphql")));
    }
}
