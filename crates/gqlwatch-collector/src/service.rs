//! Serialized access to a [`Collector`].
//!
//! The collector owns mutable state and its updates must not interleave. The
//! service moves it onto a single task; every call goes through a channel
//! and is applied in arrival order.

use std::path::PathBuf;
use std::sync::Arc;

use gqlwatch_graphql::Schema;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::Result;
use crate::collector::Collector;
use crate::devtools::{DevtoolsFragment, DevtoolsOperation};
use crate::error::CollectorError;
use crate::watch::{WatchEventKind, WatchEventResult};

const COMMAND_BUFFER: usize = 64;

enum Command {
    WatchEvent {
        kind: WatchEventKind,
        path: PathBuf,
        reply: oneshot::Sender<WatchEventResult>,
    },
    HookDocument {
        id: String,
        source: String,
        reply: oneshot::Sender<WatchEventResult>,
    },
    HookFile {
        path: PathBuf,
        reply: oneshot::Sender<WatchEventResult>,
    },
    Operations(oneshot::Sender<Vec<DevtoolsOperation>>),
    Fragments(oneshot::Sender<Vec<DevtoolsFragment>>),
    Fragment {
        name: String,
        reply: oneshot::Sender<Option<DevtoolsFragment>>,
    },
    FragmentsForType {
        type_name: String,
        reply: oneshot::Sender<Vec<DevtoolsFragment>>,
    },
    ResetAndInit(oneshot::Sender<Result<()>>),
    UpdateSchema {
        schema: Arc<Schema>,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Runs a collector on its own task.
pub struct CollectorService;

impl CollectorService {
    /// Spawns the service. The join handle yields the collector back after
    /// [`CollectorHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(mut collector: Collector) -> (CollectorHandle, JoinHandle<Collector>) {
        let (sender, mut receiver) = mpsc::channel(COMMAND_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                collector.dispatch(command).await;
            }
            info!("Collector service stopped");
            collector
        });

        (CollectorHandle { sender }, task)
    }
}

impl Collector {
    async fn dispatch(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::WatchEvent { kind, path, reply } => {
                let _ = reply.send(self.handle_watch_event(kind, &path).await);
            }
            Command::HookDocument { id, source, reply } => {
                let _ = reply.send(self.add_or_update_hook_document(&id, &source).await);
            }
            Command::HookFile { path, reply } => {
                let _ = reply.send(self.add_hook_file(path).await);
            }
            Command::Operations(reply) => {
                let _ = reply.send(self.operations().to_vec());
            }
            Command::Fragments(reply) => {
                let _ = reply.send(self.fragments().to_vec());
            }
            Command::Fragment { name, reply } => {
                let _ = reply.send(self.fragment(&name).cloned());
            }
            Command::FragmentsForType { type_name, reply } => {
                let _ = reply.send(
                    self.fragments_for_type(&type_name)
                        .into_iter()
                        .cloned()
                        .collect(),
                );
            }
            Command::ResetAndInit(reply) => {
                debug!("Resetting collector");
                self.reset();
                let _ = reply.send(self.init().await);
            }
            Command::UpdateSchema { schema, reply } => {
                let _ = reply.send(self.update_schema(schema).await);
            }
        }
    }
}

/// Cloneable handle to a running [`CollectorService`].
#[derive(Clone, Debug)]
pub struct CollectorHandle {
    sender: mpsc::Sender<Command>,
}

impl CollectorHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| CollectorError::ServiceStopped)?;
        response.await.map_err(|_| CollectorError::ServiceStopped)
    }

    pub async fn handle_watch_event(
        &self,
        kind: WatchEventKind,
        path: impl Into<PathBuf>,
    ) -> Result<WatchEventResult> {
        let path = path.into();
        self.request(|reply| Command::WatchEvent { kind, path, reply }).await
    }

    pub async fn add_or_update_hook_document(
        &self,
        id: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<WatchEventResult> {
        let (id, source) = (id.into(), source.into());
        self.request(|reply| Command::HookDocument { id, source, reply })
            .await
    }

    pub async fn add_hook_file(&self, path: impl Into<PathBuf>) -> Result<WatchEventResult> {
        let path = path.into();
        self.request(|reply| Command::HookFile { path, reply }).await
    }

    pub async fn operations(&self) -> Result<Vec<DevtoolsOperation>> {
        self.request(Command::Operations).await
    }

    pub async fn fragments(&self) -> Result<Vec<DevtoolsFragment>> {
        self.request(Command::Fragments).await
    }

    pub async fn fragment(&self, name: impl Into<String>) -> Result<Option<DevtoolsFragment>> {
        let name = name.into();
        self.request(|reply| Command::Fragment { name, reply }).await
    }

    pub async fn fragments_for_type(
        &self,
        type_name: impl Into<String>,
    ) -> Result<Vec<DevtoolsFragment>> {
        let type_name = type_name.into();
        self.request(|reply| Command::FragmentsForType { type_name, reply })
            .await
    }

    /// Resets the collector and runs `init` again, recovery included.
    pub async fn reset_and_init(&self) -> Result<()> {
        self.request(Command::ResetAndInit).await?
    }

    /// Swaps the schema and rebuilds everything against it.
    pub async fn update_schema(&self, schema: Arc<Schema>) -> Result<()> {
        self.request(|reply| Command::UpdateSchema { schema, reply })
            .await?
    }

    /// Drops this handle. The service stops once every clone is gone; queued
    /// commands are still applied.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WatchEvent { .. } => "WatchEvent",
            Self::HookDocument { .. } => "HookDocument",
            Self::HookFile { .. } => "HookFile",
            Self::Operations(_) => "Operations",
            Self::Fragments(_) => "Fragments",
            Self::Fragment { .. } => "Fragment",
            Self::FragmentsForType { .. } => "FragmentsForType",
            Self::ResetAndInit(_) => "ResetAndInit",
            Self::UpdateSchema { .. } => "UpdateSchema",
        };
        f.write_str(name)
    }
}
