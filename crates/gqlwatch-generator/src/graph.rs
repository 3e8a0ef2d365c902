//! In-process dependency graph generator.
//!
//! Units are keyed by kind and name. A reverse adjacency map records, for
//! every fragment name (including names nothing defines yet), the units that
//! spread it directly. Structural mutations mark the touched units dirty and
//! propagate along that map, so `build` only recomputes the affected subset.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use gqlwatch_graphql::{Definition, DefinitionKind, ParsedDocument, Schema};
use tracing::{debug, warn};

use crate::error::GeneratorError;
use crate::types::{
    CollectedFragment, CollectedOperation, GeneratedCode, GeneratorOutput, Timestamp, UnitKind,
};

/// Dependency-graph engine consumed by the collector.
///
/// Mutations are cheap; [`build`](Generator::build) does the work and must
/// return unchanged timestamps for unchanged content.
pub trait Generator: Send + Sync {
    /// Registers the definitions of a new document.
    fn add(&mut self, path: &str, document: &ParsedDocument) -> Result<(), GeneratorError>;

    /// Replaces the definitions of an already registered document.
    fn update(&mut self, path: &str, document: &ParsedDocument) -> Result<(), GeneratorError>;

    /// Drops every definition of a document.
    fn remove(&mut self, path: &str);

    /// Discards all documents and memoized output.
    fn reset(&mut self);

    /// Discards memoized output only. The next build reports fresh timestamps.
    fn reset_caches(&mut self);

    /// Switches to a new schema.
    fn rebind_schema(&mut self, schema: Arc<Schema>);

    /// Recomputes dirty units and returns the full output.
    fn build(&mut self) -> Result<GeneratorOutput, GeneratorError>;
}

type UnitKey = (UnitKind, String);

#[derive(Debug, Clone)]
struct Unit {
    path: String,
    definition: Definition,
}

#[derive(Debug, Clone)]
struct Memo {
    resolved: String,
    dependencies: Vec<String>,
    timestamp: Timestamp,
}

/// Default [`Generator`] implementation.
#[derive(Debug, Default)]
pub struct DocumentGenerator {
    /// Named definitions per document path.
    documents: BTreeMap<String, Vec<Definition>>,
    /// Fragment name to the units spreading it directly.
    dependents: HashMap<String, HashSet<UnitKey>>,
    dirty: HashSet<UnitKey>,
    memo: HashMap<UnitKey, Memo>,
    clock: u64,
    schema: Option<Arc<Schema>>,
}

impl DocumentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Schema the generator is bound to, if any.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Number of units waiting to be recomputed.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    fn key(definition: &Definition) -> Option<UnitKey> {
        let name = definition.name.clone()?;
        let kind = if definition.is_fragment() {
            UnitKind::Fragment
        } else {
            UnitKind::Operation
        };
        Some((kind, name))
    }

    fn insert(&mut self, path: &str, document: &ParsedDocument) {
        let mut named = Vec::new();
        for definition in document.definitions() {
            let Some(key) = Self::key(definition) else {
                warn!(path = %path, "Skipping anonymous operation");
                continue;
            };
            for spread in &definition.spreads {
                self.dependents
                    .entry(spread.clone())
                    .or_default()
                    .insert(key.clone());
            }
            self.mark_dirty(key);
            named.push(definition.clone());
        }
        self.documents.insert(path.to_string(), named);
    }

    fn detach(&mut self, path: &str) -> bool {
        let Some(definitions) = self.documents.remove(path) else {
            return false;
        };
        for definition in &definitions {
            let Some(key) = Self::key(definition) else {
                continue;
            };
            for spread in &definition.spreads {
                if let Some(set) = self.dependents.get_mut(spread) {
                    set.remove(&key);
                    if set.is_empty() {
                        self.dependents.remove(spread);
                    }
                }
            }
            self.mark_dirty(key);
        }
        true
    }

    /// Marks `key` and everything that transitively spreads it.
    fn mark_dirty(&mut self, key: UnitKey) {
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if !self.dirty.insert(key.clone()) {
                continue;
            }
            if key.0 == UnitKind::Fragment
                && let Some(dependents) = self.dependents.get(&key.1)
            {
                stack.extend(dependents.iter().cloned());
            }
        }
    }

    /// Indexes all units, rejecting names defined by two documents.
    fn units(&self) -> Result<BTreeMap<UnitKey, Unit>, GeneratorError> {
        let mut units: BTreeMap<UnitKey, Unit> = BTreeMap::new();
        for (path, definitions) in &self.documents {
            for definition in definitions {
                let Some(key) = Self::key(definition) else {
                    continue;
                };
                if let Some(existing) = units.get(&key) {
                    return Err(GeneratorError::DuplicateDefinition {
                        name: key.1,
                        first_path: existing.path.clone(),
                        second_path: path.clone(),
                    });
                }
                units.insert(
                    key,
                    Unit {
                        path: path.clone(),
                        definition: definition.clone(),
                    },
                );
            }
        }
        Ok(units)
    }

    fn next_timestamp(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp(self.clock)
    }
}

/// Transitive fragment closure of `unit` in first-use order.
fn closure(unit: &Definition, units: &BTreeMap<UnitKey, Unit>) -> Vec<String> {
    let mut order = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    if let Some(name) = unit.name.as_deref()
        && unit.is_fragment()
    {
        seen.insert(name);
    }

    let mut stack: Vec<&str> = unit.spreads.iter().rev().map(String::as_str).collect();
    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        order.push(name.to_string());
        if let Some(fragment) = units.get(&(UnitKind::Fragment, name.to_string())) {
            stack.extend(fragment.definition.spreads.iter().rev().map(String::as_str));
        }
    }
    order
}

impl Generator for DocumentGenerator {
    fn add(&mut self, path: &str, document: &ParsedDocument) -> Result<(), GeneratorError> {
        if self.documents.contains_key(path) {
            return self.update(path, document);
        }
        debug!(path = %path, "Generator add");
        self.insert(path, document);
        Ok(())
    }

    fn update(&mut self, path: &str, document: &ParsedDocument) -> Result<(), GeneratorError> {
        debug!(path = %path, "Generator update");
        self.detach(path);
        self.insert(path, document);
        Ok(())
    }

    fn remove(&mut self, path: &str) {
        if self.detach(path) {
            debug!(path = %path, "Generator remove");
        }
    }

    fn reset(&mut self) {
        self.documents.clear();
        self.dependents.clear();
        self.dirty.clear();
        self.memo.clear();
    }

    fn reset_caches(&mut self) {
        self.memo.clear();
    }

    fn rebind_schema(&mut self, schema: Arc<Schema>) {
        self.schema = Some(schema);
        self.memo.clear();
    }

    fn build(&mut self) -> Result<GeneratorOutput, GeneratorError> {
        let units = self.units()?;
        self.memo.retain(|key, _| units.contains_key(key));

        let mut recomputed = 0usize;
        for (key, unit) in &units {
            if !self.dirty.contains(key) && self.memo.contains_key(key) {
                continue;
            }
            recomputed += 1;

            let dependencies = closure(&unit.definition, &units);
            let mut resolved = unit.definition.source.clone();
            for dependency in &dependencies {
                if let Some(fragment) = units.get(&(UnitKind::Fragment, dependency.clone())) {
                    resolved.push_str("\n\n");
                    resolved.push_str(&fragment.definition.source);
                }
            }

            let unchanged = self
                .memo
                .get(key)
                .is_some_and(|memo| memo.resolved == resolved);
            if unchanged {
                if let Some(memo) = self.memo.get_mut(key) {
                    memo.dependencies = dependencies;
                }
                continue;
            }

            let timestamp = self.next_timestamp();
            self.memo.insert(
                key.clone(),
                Memo {
                    resolved,
                    dependencies,
                    timestamp,
                },
            );
        }
        self.dirty.clear();
        debug!(units = units.len(), recomputed, "Generator build");

        let mut output = GeneratorOutput::default();
        for (key, unit) in &units {
            let Some(memo) = self.memo.get(key) else {
                continue;
            };
            let definition = &unit.definition;

            output.code.push(GeneratedCode {
                kind: key.0,
                graphql_name: key.1.clone(),
                source: definition.source.clone(),
                fragment_dependencies: memo.dependencies.clone(),
                timestamp: memo.timestamp,
                path: unit.path.clone(),
            });

            match &definition.kind {
                DefinitionKind::Fragment { type_condition } => {
                    output.fragments.push(CollectedFragment {
                        name: key.1.clone(),
                        type_condition: type_condition.clone(),
                        source: definition.source.clone(),
                        fragment_dependencies: memo.dependencies.clone(),
                        timestamp: memo.timestamp,
                        path: unit.path.clone(),
                    });
                }
                DefinitionKind::Operation(kind) => {
                    output.operations.push(CollectedOperation {
                        name: key.1.clone(),
                        operation_kind: *kind,
                        source: definition.source.clone(),
                        fragment_dependencies: memo.dependencies.clone(),
                        timestamp: memo.timestamp,
                        path: unit.path.clone(),
                    });
                }
            }
        }

        Ok(output)
    }
}
