use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gqlwatch_collector::{
    Collector, CollectorHandle, CollectorService, Mode, TerminalPrompt, default_observers,
    relative_path,
};
use gqlwatch_config::GqlwatchConfig;
use gqlwatch_graphql::{LoadOptions, RemoteSchemaProvider, SchemaProvider, provider_for};
use tracing::{debug, error, info, warn};

use crate::cli::DevArgs;
use crate::output::{print_field, print_success};
use crate::watcher::{FileChange, FileWatcher};

fn collector(config: &GqlwatchConfig, provider: Arc<dyn SchemaProvider>, mode: Mode) -> Result<Collector> {
    Ok(Collector::new(config.clone(), provider)?.with_mode(mode))
}

pub async fn build(config: &GqlwatchConfig) -> Result<()> {
    let output_dir = config.output_path();
    let mut collector = collector(config, provider_for(config), Mode::Build)?
        .with_observers(default_observers(&output_dir));
    collector.init().await?;

    print_success(&format!(
        "Built {} document(s) into {}",
        collector.document_paths().len(),
        output_dir.display()
    ));
    Ok(())
}

pub async fn validate(config: &GqlwatchConfig) -> Result<()> {
    let mut collector = collector(config, provider_for(config), Mode::Build)?;
    collector.init().await?;

    print_success(&format!(
        "{} operation(s) valid",
        collector.validation_count()
    ));
    Ok(())
}

pub async fn download_schema(config: &GqlwatchConfig) -> Result<()> {
    let Some(provider) = RemoteSchemaProvider::from_config(config) else {
        bail!("schema.endpoint is not configured");
    };
    let schema = provider.download().await?;

    print_success("Schema downloaded");
    print_field("Path", config.schema_path().display());
    print_field("Types", schema.types().count());
    Ok(())
}

pub async fn dev(config: &GqlwatchConfig, args: &DevArgs) -> Result<()> {
    let provider = provider_for(config);
    let mut collector = collector(config, Arc::clone(&provider), Mode::Dev)?
        .with_prompt(Arc::new(TerminalPrompt::new()))
        .with_observers(default_observers(config.output_path()));
    collector.init().await?;
    print_success(&format!(
        "Watching {} document(s)",
        collector.document_paths().len()
    ));

    let (handle, task) = CollectorService::spawn(collector);
    let (watcher, mut changes) = FileWatcher::new(
        config.root_dir.clone(),
        vec![config.output_path()],
        Duration::from_millis(args.debounce_ms),
    )?;
    info!(root = %watcher.root().display(), "Watching for changes");

    let schema_path = config.schema_path();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            change = changes.recv() => {
                let Some(change) = change else { break };
                if change.path == schema_path {
                    reload_schema(&handle, provider.as_ref()).await?;
                } else {
                    forward(&handle, &config.root_dir, change).await?;
                }
            }
        }
    }

    drop(watcher);
    handle.shutdown();
    task.await.context("collector service panicked")?;
    Ok(())
}

async fn forward(handle: &CollectorHandle, root: &Path, change: FileChange) -> Result<()> {
    let path = log_path(root, &change.path);
    debug!(kind = %change.kind, %path, "File changed");
    let result = handle.handle_watch_event(change.kind, change.path).await?;

    if let Some(err) = &result.error {
        error!(%path, "{}", err.message);
    } else if result.has_changed {
        info!(
            %path,
            affected = ?result.affected_operations,
            "Rebuilt"
        );
    }
    Ok(())
}

async fn reload_schema(handle: &CollectorHandle, provider: &dyn SchemaProvider) -> Result<()> {
    let schema = match provider.load_schema(LoadOptions::disk()).await {
        Ok(schema) => schema,
        Err(e) => {
            warn!(error = %e, "Schema changed but could not be loaded");
            return Ok(());
        }
    };

    info!("Schema changed, revalidating all documents");
    if let Err(e) = handle.update_schema(schema).await {
        error!(error = %e, "Rebuild after schema change failed");
    }
    Ok(())
}

/// Path as shown in the validation report: relative to the project root.
fn log_path(root: &Path, path: &Path) -> String {
    relative_path(root, &path.to_string_lossy())
}
