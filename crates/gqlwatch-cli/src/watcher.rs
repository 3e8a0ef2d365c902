//! File system watcher feeding the collector in dev mode.
//!
//! Raw notify events are debounced per path by `notify-debouncer-mini`, which
//! reports a path once it has been quiet for the debounce window. Each
//! reported path is then classified by what is on disk at that moment, so the
//! collector always reads a file's final state. Missing paths are sent as
//! `UnlinkDir`: a directory prefix also matches the file itself, so one event
//! covers both cases.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gqlwatch_collector::WatchEventKind;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// One change to forward to the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl FileChange {
    fn new(kind: WatchEventKind, path: &Path) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
        }
    }
}

/// Recursive, debounced watcher over the project root.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `root`. Paths under any of `ignored` are dropped.
    pub fn new(
        root: PathBuf,
        ignored: Vec<PathBuf>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let (tx, rx) = mpsc::channel(256);

        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| {
            let events = match res {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = ?e, "File watcher error");
                    return;
                }
            };

            for event in events {
                if ignored.iter().any(|dir| event.path.starts_with(dir)) {
                    continue;
                }
                let Some(change) = classify(&event.path) else {
                    continue;
                };
                trace!(kind = %change.kind, path = %change.path.display(), "Debounced change");
                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })
        .context("failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        Ok((
            Self {
                _debouncer: debouncer,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Classifies a settled path by its current state on disk.
///
/// Existing files are sent as `Change`; the collector adds them if they are
/// not tracked yet. Directories are skipped.
pub fn classify(path: &Path) -> Option<FileChange> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => None,
        Ok(_) => Some(FileChange::new(WatchEventKind::Change, path)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Some(FileChange::new(WatchEventKind::UnlinkDir, path))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot inspect changed path");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_by_disk_state() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.graphql");
        std::fs::write(&file, "query A { a }").unwrap();

        assert_eq!(
            classify(&file),
            Some(FileChange::new(WatchEventKind::Change, &file))
        );
        assert_eq!(classify(temp_dir.path()), None);

        let gone = temp_dir.path().join("gone");
        assert_eq!(
            classify(&gone),
            Some(FileChange::new(WatchEventKind::UnlinkDir, &gone))
        );
    }

    async fn next_for(
        rx: &mut mpsc::Receiver<FileChange>,
        path: &Path,
        kind: WatchEventKind,
    ) -> FileChange {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(change) if change.path == path && change.kind == kind => return change,
                    Some(_) => continue,
                    None => panic!("watcher stopped"),
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_truncate_then_write_reports_final_state() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let (_watcher, mut rx) =
            FileWatcher::new(root.clone(), Vec::new(), Duration::from_millis(50)).unwrap();

        let path = root.join("a.graphql");
        std::fs::write(&path, "").unwrap();
        std::fs::write(&path, "query A { a }").unwrap();

        next_for(&mut rx, &path, WatchEventKind::Change).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "query A { a }");

        std::fs::remove_file(&path).unwrap();
        next_for(&mut rx, &path, WatchEventKind::UnlinkDir).await;
    }

    #[tokio::test]
    async fn test_ignored_paths_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let out = root.join("out");
        std::fs::create_dir_all(&out).unwrap();
        let (_watcher, mut rx) =
            FileWatcher::new(root.clone(), vec![out.clone()], Duration::from_millis(50)).unwrap();

        std::fs::write(out.join("types.ts"), "export {}").unwrap();
        let kept = root.join("b.graphql");
        std::fs::write(&kept, "query B { b }").unwrap();

        let change = next_for(&mut rx, &kept, WatchEventKind::Change).await;
        assert_eq!(change.path, kept);
        while let Ok(change) = rx.try_recv() {
            assert!(!change.path.starts_with(&out));
        }
    }
}
