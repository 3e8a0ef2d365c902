//! Validation report.
//!
//! One entry per operation that was (re)validated in a build pass. Entries are
//! sorted by operation type, then name, and emitted as a single log event.

use colored::Colorize;
use gqlwatch_graphql::OperationKind;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub operation: String,
    pub kind: OperationKind,
    /// Source path relative to the project root.
    pub path: String,
    /// Validation messages. Empty means the operation passed.
    pub errors: Vec<String>,
}

impl ReportEntry {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sorts entries by operation type, then operation name.
pub fn sort_entries(entries: &mut [ReportEntry]) {
    entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.operation.cmp(&b.operation)));
}

/// Renders entries as a table.
pub fn render(entries: &[ReportEntry]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["", "Type", "Operation", "File", "Errors"]);

    for entry in entries {
        let status = if entry.is_ok() {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };
        let errors = if entry.is_ok() {
            "-".to_string()
        } else {
            entry.errors.join("\n")
        };
        builder.push_record([
            status,
            entry.kind.to_string(),
            entry.operation.clone(),
            entry.path.clone(),
            errors,
        ]);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Sorts and logs the report. Nothing is logged for an empty report.
pub fn emit(entries: &mut [ReportEntry]) {
    if entries.is_empty() {
        return;
    }
    sort_entries(entries);

    let failed = entries.iter().filter(|e| !e.is_ok()).count();
    let table = render(entries);
    if failed > 0 {
        error!(failed, total = entries.len(), "GraphQL validation report\n{table}");
    } else {
        info!(total = entries.len(), "GraphQL validation report\n{table}");
    }
}
