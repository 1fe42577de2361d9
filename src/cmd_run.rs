//! `deferrun run` - recover persisted jobs and fire them until interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use deferrun_config::Config;
use deferrun_core::HandlerRegistry;
use deferrun_handler_command::CommandHandler;
use deferrun_scheduler::JobService;

use crate::open_store;

/// Build the handler registry from `[handlers.<kind>]` entries.
pub(crate) fn build_registry(config: &Config) -> anyhow::Result<HandlerRegistry> {
    let registry = HandlerRegistry::new();

    let mut kinds: Vec<&String> = config.handlers.keys().collect();
    kinds.sort();
    for kind in kinds {
        let entry = &config.handlers[kind];
        let mut handler = CommandHandler::new(kind.as_str(), entry.program.as_str())
            .with_args(entry.args.clone());
        if let Some(secs) = entry.timeout_secs {
            handler = handler.with_timeout(Duration::from_secs(secs));
        }
        info!("Registered handler '{}' -> {}", kind, handler.program());
        registry.register(Arc::new(handler))?;
    }

    Ok(registry)
}

pub(crate) async fn run(config: &Config, data_dir: &Path) -> anyhow::Result<()> {
    info!("Starting deferrun (data dir: {})", data_dir.display());

    let store = open_store(config, data_dir).await?;
    let handlers = Arc::new(build_registry(config)?);
    if handlers.is_empty() {
        warn!("No handlers registered; due jobs will fail as unsupported");
    }

    let service = JobService::new(store, handlers, config.scheduler.missed_job_policy);

    let report = service.recover().await;
    if let Err(e) = report.into_result() {
        warn!("{}; the remaining jobs were recovered", e);
    }

    info!("Scheduler running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    service.shutdown().await;
    Ok(())
}
