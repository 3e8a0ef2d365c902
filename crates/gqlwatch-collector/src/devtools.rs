//! Dev-tool views and live snapshot broadcast.
//!
//! After each successful build in dev mode the collector materializes a
//! denormalized view of every operation and fragment, including the full
//! source with the fragment closure inlined, and refreshes a keyed snapshot
//! (`kind_name` to the latest generated entry). Observers receive only the
//! entries whose timestamp changed.

use std::collections::{HashMap, HashSet};

use gqlwatch_generator::{GeneratedCode, GeneratorOutput, Timestamp};
use gqlwatch_graphql::OperationKind;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Default buffer size for the devtools channel.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Operation as shown to inspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevtoolsOperation {
    pub name: String,
    pub operation_kind: OperationKind,
    pub path: String,
    pub source: String,
    /// Source with the fragment closure appended.
    pub full_source: String,
    pub fragment_dependencies: Vec<String>,
    pub timestamp: Timestamp,
}

/// Fragment as shown to inspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevtoolsFragment {
    pub name: String,
    pub type_condition: String,
    pub path: String,
    pub source: String,
    pub full_source: String,
    pub fragment_dependencies: Vec<String>,
    pub timestamp: Timestamp,
}

/// One changed snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    /// `kind_name`, e.g. `operation_UserQuery`.
    pub key: String,
    pub code: GeneratedCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "entries", rename_all = "camelCase")]
pub enum DevtoolsEvent {
    /// Entries that are new or whose timestamp changed.
    Updated(Vec<SnapshotEntry>),
    /// Keys of entries that no longer exist.
    Removed(Vec<String>),
}

/// Broadcast channel for devtools events.
#[derive(Clone)]
pub struct DevtoolsBroadcaster {
    sender: broadcast::Sender<DevtoolsEvent>,
}

impl DevtoolsBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn send(&self, event: DevtoolsEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DevtoolsEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DevtoolsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DevtoolsBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevtoolsBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Materialized views plus the keyed snapshot.
#[derive(Debug, Default)]
pub struct DevtoolsState {
    operations: Vec<DevtoolsOperation>,
    fragments: Vec<DevtoolsFragment>,
    snapshot: HashMap<String, GeneratedCode>,
    broadcaster: DevtoolsBroadcaster,
}

impl DevtoolsState {
    pub fn new(broadcaster: DevtoolsBroadcaster) -> Self {
        Self {
            broadcaster,
            ..Self::default()
        }
    }

    pub fn broadcaster(&self) -> &DevtoolsBroadcaster {
        &self.broadcaster
    }

    /// Rebuilds the views from `output` and broadcasts changed snapshot entries.
    ///
    /// `relative` maps a document path to the path shown to users.
    pub fn refresh(&mut self, output: &GeneratorOutput, relative: impl Fn(&str) -> String) {
        self.operations = output
            .collected_operations()
            .iter()
            .map(|op| DevtoolsOperation {
                name: op.name.clone(),
                operation_kind: op.operation_kind,
                path: relative(&op.path),
                source: op.source.clone(),
                full_source: output.resolved_source(&op.source, &op.fragment_dependencies),
                fragment_dependencies: op.fragment_dependencies.clone(),
                timestamp: op.timestamp,
            })
            .collect();

        self.fragments = output
            .fragments()
            .iter()
            .map(|fragment| DevtoolsFragment {
                name: fragment.name.clone(),
                type_condition: fragment.type_condition.clone(),
                path: relative(&fragment.path),
                source: fragment.source.clone(),
                full_source: output
                    .resolved_source(&fragment.source, &fragment.fragment_dependencies),
                fragment_dependencies: fragment.fragment_dependencies.clone(),
                timestamp: fragment.timestamp,
            })
            .collect();

        let mut changed = Vec::new();
        let mut live = HashSet::with_capacity(output.generated_code().len());
        for code in output.generated_code() {
            let key = code.key();
            live.insert(key.clone());
            if self.snapshot.get(&key).map(|c| c.timestamp) == Some(code.timestamp) {
                continue;
            }
            self.snapshot.insert(key.clone(), code.clone());
            changed.push(SnapshotEntry {
                key,
                code: code.clone(),
            });
        }

        let mut removed: Vec<String> = self
            .snapshot
            .keys()
            .filter(|key| !live.contains(*key))
            .cloned()
            .collect();
        removed.sort();
        for key in &removed {
            self.snapshot.remove(key);
        }

        debug!(changed = changed.len(), removed = removed.len(), "Devtools snapshot refreshed");
        if !changed.is_empty() {
            self.broadcaster.send(DevtoolsEvent::Updated(changed));
        }
        if !removed.is_empty() {
            self.broadcaster.send(DevtoolsEvent::Removed(removed));
        }
    }

    /// Drops views and the snapshot. Subscribers stay connected.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.fragments.clear();
        self.snapshot.clear();
    }

    pub fn operations(&self) -> &[DevtoolsOperation] {
        &self.operations
    }

    pub fn fragments(&self) -> &[DevtoolsFragment] {
        &self.fragments
    }

    pub fn fragment(&self, name: &str) -> Option<&DevtoolsFragment> {
        self.fragments.iter().find(|f| f.name == name)
    }

    pub fn fragments_for_type(&self, type_name: &str) -> Vec<&DevtoolsFragment> {
        self.fragments
            .iter()
            .filter(|f| f.type_condition == type_name)
            .collect()
    }

    /// Current snapshot entries, sorted by key.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<SnapshotEntry> = self
            .snapshot
            .iter()
            .map(|(key, code)| SnapshotEntry {
                key: key.clone(),
                code: code.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlwatch_generator::{DocumentGenerator, Generator};
    use gqlwatch_graphql::ParsedDocument;

    fn add(generator: &mut DocumentGenerator, path: &str, source: &str) {
        generator
            .add(path, &ParsedDocument::parse(path, source).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_broadcasts_only_changes() {
        let mut generator = DocumentGenerator::new();
        add(&mut generator, "q.graphql", "query Q { user { ...F } }");
        add(&mut generator, "f.graphql", "fragment F on User { id }");
        add(&mut generator, "o.graphql", "query Other { posts { id } }");

        let broadcaster = DevtoolsBroadcaster::new();
        let mut receiver = broadcaster.subscribe();
        let mut state = DevtoolsState::new(broadcaster);

        state.refresh(&generator.build().unwrap(), str::to_string);
        let DevtoolsEvent::Updated(first) = receiver.recv().await.unwrap() else {
            panic!("expected update");
        };
        assert_eq!(first.len(), 3);

        add(&mut generator, "f.graphql", "fragment F on User { id name }");
        state.refresh(&generator.build().unwrap(), str::to_string);
        let DevtoolsEvent::Updated(second) = receiver.recv().await.unwrap() else {
            panic!("expected update");
        };
        let keys: Vec<&str> = second.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["fragment_F", "operation_Q"]);

        let q = state.operations().iter().find(|o| o.name == "Q").unwrap();
        assert!(q.full_source.contains("fragment F on User { id name }"));
        assert_eq!(state.fragments_for_type("User").len(), 1);
        assert!(state.fragment("F").is_some());
    }

    #[tokio::test]
    async fn test_refresh_reports_removed_units() {
        let mut generator = DocumentGenerator::new();
        add(&mut generator, "o.graphql", "query Other { posts { id } }");

        let broadcaster = DevtoolsBroadcaster::new();
        let mut receiver = broadcaster.subscribe();
        let mut state = DevtoolsState::new(broadcaster);
        state.refresh(&generator.build().unwrap(), str::to_string);
        let _ = receiver.recv().await.unwrap();

        generator.remove("o.graphql");
        state.refresh(&generator.build().unwrap(), str::to_string);
        assert_eq!(
            receiver.recv().await.unwrap(),
            DevtoolsEvent::Removed(vec!["operation_Other".into()])
        );
        assert!(state.snapshot().is_empty());
    }
}
