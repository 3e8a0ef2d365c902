//! # gqlwatch-collector
//!
//! The collector owns every known GraphQL document, drives the generator and
//! keeps validation incremental: an operation is revalidated only when its
//! resolved text (own source plus fragment closure) changed since it last
//! passed.
//!
//! ## Sources
//!
//! - files matched by the configured patterns
//! - static documents from configuration (one synthetic document)
//! - hook documents and hook files registered programmatically
//!
//! ## Driving it
//!
//! [`Collector::init`] runs a full build. [`Collector::handle_watch_event`]
//! applies one file-system change. In a long-running process wrap the
//! collector in a [`CollectorService`] so updates are serialized.

mod collector;
mod devtools;
mod error;
mod hooks;
mod prompt;
mod report;
mod service;
mod templates;
mod watch;

pub use collector::{Collector, Mode, relative_path};
pub use devtools::{
    DevtoolsBroadcaster, DevtoolsEvent, DevtoolsFragment, DevtoolsOperation, DevtoolsState,
    SnapshotEntry,
};
pub use error::CollectorError;
pub use hooks::{CONFIG_DOCUMENTS_PATH, HOOK_PREFIX, HookRegistry, hook_key};
pub use prompt::{AutoPrompt, Prompt, TerminalPrompt};
pub use report::{ReportEntry, render as render_report};
pub use service::{CollectorHandle, CollectorService};
pub use templates::{
    BuildContext, BuildObserver, OperationsManifest, TemplateError, TypesTemplate,
    default_observers,
};
pub use watch::{WatchError, WatchEventKind, WatchEventResult};

/// Type alias for collector results.
pub type Result<T> = std::result::Result<T, CollectorError>;
