//! deferrun - exactly-once deferred job scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use deferrun_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use deferrun_core::SystemClock;
use deferrun_store::{FileBackend, JobStore};

mod cli;
mod cmd_jobs;
mod cmd_run;

use cli::{Cli, Commands};

/// Initialize tracing with console and, optionally, daily file output.
///
/// Log files go to `<data_dir>/logs/`. `RUST_LOG` overrides the configured level.
fn init_tracing(
    logging: &LoggingConfig,
    data_dir: &Path,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_ascii_lowercase()));

    let console = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    if !logging.file {
        tracing_subscriber::registry().with(env_filter).with(console).init();
        return Ok(None);
    }

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("deferrun")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}

/// Load and validate configuration, applying the `--data-dir` override.
fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<(Config, PathBuf)> {
    let config = ConfigLoader::load_or_default(path).context("loading configuration")?;
    let warnings = ConfigValidator::validate(&config)?.into_result()?;
    for warning in warnings {
        eprintln!("config warning: {}: {}", warning.path, warning.message);
    }

    let data_dir = data_dir.unwrap_or_else(|| config.store.data_dir());
    Ok((config, data_dir))
}

/// Open the file-backed store under `data_dir`.
pub(crate) async fn open_store(config: &Config, data_dir: &Path) -> anyhow::Result<Arc<JobStore>> {
    let backend = FileBackend::new(data_dir)
        .await
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    let store = JobStore::open(Arc::new(backend), Arc::new(SystemClock::new()))
        .await?
        .with_retention(config.store.payload_retention);
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, data_dir) = load_config(cli.config.as_deref(), cli.data_dir)?;
    let _guard = init_tracing(&config.logging, &data_dir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run::run(&config, &data_dir).await,
        Commands::Add { file, at, kind, name } => {
            cmd_jobs::add(&config, &data_dir, &file, &at, kind, name).await
        }
        Commands::List { format } => cmd_jobs::list(&config, &data_dir, format).await,
        Commands::Delete { id } => cmd_jobs::delete(&config, &data_dir, &id).await,
        Commands::Cancel { id } => cmd_jobs::cancel(&config, &data_dir, &id).await,
    }
}
