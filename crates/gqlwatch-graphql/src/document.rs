//! GraphQL documents.
//!
//! A [`Document`] is one source unit: a file on disk, a hook document or the
//! synthetic document holding static configuration text. Its parsed form is
//! always in sync with its content; the only mutation is [`Document::refresh`],
//! which re-reads the file and replaces content and AST together or not at all.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_graphql_parser::types::{
    DocumentOperations, ExecutableDocument, OperationType, Selection, SelectionSet,
};
use async_graphql_parser::{Error as ParserError, Pos, parse_query};
use serde::{Deserialize, Serialize};

use crate::error::GraphQLError;
use crate::split::split_definitions;

/// Operation appended to fragment-only sources so the parser accepts them.
const FRAGMENTS_ONLY_SENTINEL: &str = "query __GqlwatchFragmentsOnly { __typename }";

/// The type of an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

/// What a top-level definition declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Operation(OperationKind),
    Fragment { type_condition: String },
}

/// A top-level definition with its own source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Definition name. `None` only for anonymous operations.
    pub name: Option<String>,
    pub kind: DefinitionKind,
    /// Source text of this definition alone.
    pub source: String,
    /// Fragments spread directly by this definition, in first-use order.
    pub spreads: Vec<String>,
}

impl Definition {
    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, DefinitionKind::Fragment { .. })
    }

    pub fn operation_kind(&self) -> Option<OperationKind> {
        match self.kind {
            DefinitionKind::Operation(kind) => Some(kind),
            DefinitionKind::Fragment { .. } => None,
        }
    }
}

/// Syntax-only parse result of a document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    ast: ExecutableDocument,
    definitions: Vec<Definition>,
}

impl ParsedDocument {
    /// Parses `source`. `path` is only used in error messages.
    pub fn parse(path: &str, source: &str) -> Result<Self, GraphQLError> {
        if source.trim().is_empty() {
            return Err(GraphQLError::EmptyDocument(path.to_string()));
        }

        let ast = parse_executable(source).map_err(|e| GraphQLError::parse(path, e.to_string()))?;
        let definitions = collect_definitions(path, source, &ast)?;

        Ok(Self { ast, definitions })
    }

    /// The parser AST.
    pub fn ast(&self) -> &ExecutableDocument {
        &self.ast
    }

    /// Definitions in source order.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn operations(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter().filter(|d| !d.is_fragment())
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter().filter(|d| d.is_fragment())
    }
}

/// Parses an executable document, accepting documents that only define fragments.
pub fn parse_executable(source: &str) -> Result<ExecutableDocument, ParserError> {
    match parse_query(source) {
        Err(ParserError::MissingOperation) => {
            let mut ast = parse_query(format!("{source}\n{FRAGMENTS_ONLY_SENTINEL}"))?;
            ast.operations = DocumentOperations::Multiple(HashMap::new());
            Ok(ast)
        }
        other => other,
    }
}

fn collect_definitions(
    path: &str,
    source: &str,
    ast: &ExecutableDocument,
) -> Result<Vec<Definition>, GraphQLError> {
    let spans = split_definitions(source);
    let mut used = vec![false; spans.len()];
    let mut located = Vec::new();

    let mut locate = |pos: Pos, what: &dyn fmt::Display| -> Result<(usize, String), GraphQLError> {
        let found = byte_offset(source, pos).and_then(|offset| {
            let index = spans.iter().position(|span| span.contains(&offset))?;
            Some((offset, index))
        });
        let Some((offset, index)) = found.filter(|(_, index)| !used[*index]) else {
            return Err(GraphQLError::parse(
                path,
                format!("could not locate the source of {what} at {}:{}", pos.line, pos.column),
            ));
        };
        used[index] = true;
        Ok((offset, source[offset..spans[index].end].trim_end().to_string()))
    };

    for (name, operation) in ast.operations.iter() {
        let label = match name {
            Some(name) => format!("operation {name}"),
            None => "anonymous operation".to_string(),
        };
        let (offset, text) = locate(operation.pos, &label)?;

        let mut spreads = Vec::new();
        collect_spreads(&operation.node.selection_set.node, &mut spreads);
        located.push((
            offset,
            Definition {
                name: name.map(|n| n.to_string()),
                kind: DefinitionKind::Operation(operation.node.ty.into()),
                source: text,
                spreads,
            },
        ));
    }

    for (name, fragment) in &ast.fragments {
        let (offset, text) = locate(fragment.pos, &format!("fragment {name}"))?;

        let mut spreads = Vec::new();
        collect_spreads(&fragment.node.selection_set.node, &mut spreads);
        located.push((
            offset,
            Definition {
                name: Some(name.to_string()),
                kind: DefinitionKind::Fragment {
                    type_condition: fragment.node.type_condition.node.on.node.to_string(),
                },
                source: text,
                spreads,
            },
        ));
    }

    located.sort_by_key(|(offset, _)| *offset);
    Ok(located.into_iter().map(|(_, definition)| definition).collect())
}

/// Converts a 1-based line and character column into a byte offset.
fn byte_offset(source: &str, pos: Pos) -> Option<usize> {
    let line_start = match pos.line {
        0 => return None,
        1 => 0,
        line => source.match_indices('\n').nth(line - 2)?.0 + 1,
    };
    let line = &source[line_start..];
    let (index, _) = line.char_indices().nth(pos.column.checked_sub(1)?)?;
    Some(line_start + index)
}

fn collect_spreads(set: &SelectionSet, out: &mut Vec<String>) {
    for item in &set.items {
        match &item.node {
            Selection::Field(field) => collect_spreads(&field.node.selection_set.node, out),
            Selection::FragmentSpread(spread) => {
                let name = spread.node.fragment_name.node.as_str();
                if !out.iter().any(|s| s == name) {
                    out.push(name.to_string());
                }
            }
            Selection::InlineFragment(inline) => {
                collect_spreads(&inline.node.selection_set.node, out)
            }
        }
    }
}

/// One source unit tracked by the collector.
#[derive(Debug, Clone)]
pub struct Document {
    path: String,
    content: String,
    parsed: ParsedDocument,
    on_disk: bool,
}

impl Document {
    /// Creates a document from content supplied directly (hooks, config).
    pub fn from_source(
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, GraphQLError> {
        let path = path.into();
        let content = content.into();
        let parsed = ParsedDocument::parse(&path, &content)?;

        Ok(Self {
            path,
            content,
            parsed,
            on_disk: false,
        })
    }

    /// Reads and parses a document from disk.
    ///
    /// Returns [`GraphQLError::EmptyDocument`] for files without content.
    pub async fn read(path: &Path) -> Result<Self, GraphQLError> {
        let content = tokio::fs::read_to_string(path).await?;
        let key = path_key(path);
        let parsed = ParsedDocument::parse(&key, &content)?;

        Ok(Self {
            path: key,
            content,
            parsed,
            on_disk: true,
        })
    }

    /// Re-reads the document from disk.
    ///
    /// Returns `Ok(true)` if the content changed and was re-parsed, `Ok(false)`
    /// if it is identical or the document does not live on disk. On error the
    /// document is left untouched and should be evicted by the caller.
    pub async fn refresh(&mut self) -> Result<bool, GraphQLError> {
        if !self.on_disk {
            return Ok(false);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content == self.content {
            return Ok(false);
        }

        let parsed = ParsedDocument::parse(&self.path, &content)?;
        self.content = content;
        self.parsed = parsed;
        Ok(true)
    }

    /// Unique key: a filesystem path or a synthetic identifier.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn parsed(&self) -> &ParsedDocument {
        &self.parsed
    }

    pub fn definitions(&self) -> &[Definition] {
        self.parsed.definitions()
    }

    /// Whether the document may be refreshed from disk.
    pub fn is_on_disk(&self) -> bool {
        self.on_disk
    }

    /// Filesystem path, for documents that live on disk.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.on_disk.then(|| PathBuf::from(&self.path))
    }
}

/// Key used for documents that live on disk.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
