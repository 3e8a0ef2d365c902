//! Interactive confirmation prompts used by the recovery path.

use std::future::Future;
use std::io::BufRead;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::AbortHandle;
use tracing::warn;

/// Asks the user a yes/no question.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

type Lines = Arc<AsyncMutex<mpsc::UnboundedReceiver<String>>>;

/// Terminal prompt reading the answer from stdin.
///
/// Stdin is read line by line on one dedicated thread, started by the first
/// prompt. Issuing a new prompt aborts the previous one if it is still
/// pending, so only the most recent decision is honored. An aborted prompt
/// answers no. Lines typed before a prompt is shown are discarded.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    lines: OnceLock<Lines>,
    pending: Mutex<Option<AbortHandle>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt answered from `lines` instead of stdin.
    pub fn with_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        let prompt = Self::default();
        let _ = prompt.lines.set(Arc::new(AsyncMutex::new(lines)));
        prompt
    }

    fn lines(&self) -> Lines {
        Arc::clone(self.lines.get_or_init(spawn_stdin_reader))
    }

    /// Runs `task` as the only pending prompt. Returns `None` if it was aborted.
    async fn exclusive<F, T>(&self, task: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(task);
        if let Ok(mut pending) = self.pending.lock()
            && let Some(previous) = pending.replace(handle.abort_handle())
        {
            previous.abort();
        }
        handle.await.ok()
    }
}

fn spawn_stdin_reader() -> Lines {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read from stdin");
                    return;
                }
            }
        }
    });
    Arc::new(AsyncMutex::new(rx))
}

async fn read_answer(message: String, lines: Lines) -> std::io::Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{message} [y/N] ").as_bytes()).await?;
    stdout.flush().await?;

    let mut lines = lines.lock_owned().await;
    while lines.try_recv().is_ok() {}

    // Closed stdin answers no
    let Some(line) = lines.recv().await else {
        return Ok(false);
    };
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[async_trait]
impl Prompt for TerminalPrompt {
    async fn confirm(&self, message: &str) -> bool {
        match self.exclusive(read_answer(message.to_string(), self.lines())).await {
            Some(Ok(answer)) => answer,
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read prompt answer");
                false
            }
            None => false,
        }
    }
}

/// Prompt with a fixed answer, for non-interactive runs and tests.
#[derive(Debug, Default)]
pub struct AutoPrompt {
    answer: bool,
    asked: AtomicUsize,
}

impl AutoPrompt {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    /// How many times the prompt was shown.
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompt for AutoPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}
