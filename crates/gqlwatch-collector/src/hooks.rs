//! Programmatic document sources.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Key prefix of hook documents.
pub const HOOK_PREFIX: &str = "hook:";

/// Synthetic path of the document holding static configuration text.
pub const CONFIG_DOCUMENTS_PATH: &str = "config:documents";

/// Document key for a hook id.
pub fn hook_key(id: &str) -> String {
    format!("{HOOK_PREFIX}{id}")
}

/// Hook documents and hook files. Both survive `reset` and are replayed by
/// every `init`.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    documents: BTreeMap<String, String>,
    files: BTreeSet<PathBuf>,
}

impl HookRegistry {
    /// Registers or overwrites a hook document. Returns true if the source changed.
    pub fn add_document(&mut self, id: impl Into<String>, source: impl Into<String>) -> bool {
        let source = source.into();
        let previous = self.documents.insert(id.into(), source.clone());
        previous.as_deref() != Some(source.as_str())
    }

    /// Registers an always-included file. Returns false if it was already known.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> bool {
        self.files.insert(path.into())
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Hook documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = (&str, &str)> {
        self.documents.iter().map(|(id, s)| (id.as_str(), s.as_str()))
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_overwrite() {
        let mut registry = HookRegistry::default();
        assert!(registry.add_document("auth", "query A { a }"));
        assert!(!registry.add_document("auth", "query A { a }"));
        assert!(registry.add_document("auth", "query A { b }"));
        assert_eq!(registry.documents().count(), 1);
        assert_eq!(hook_key("auth"), "hook:auth");
    }

    #[test]
    fn test_files() {
        let mut registry = HookRegistry::default();
        assert!(registry.add_file("/abs/extra.graphql"));
        assert!(!registry.add_file("/abs/extra.graphql"));
        assert!(registry.contains_file(Path::new("/abs/extra.graphql")));
    }
}
