//! Offline job maintenance: `add`, `list`, `delete`, `cancel`.
//!
//! These commands open the store directly. The store's single-writer lock is
//! in-process only, so they must not run against a data directory that a
//! live `deferrun run` owns.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use deferrun_config::Config;
use deferrun_core::{Job, JobStatus, kind_from_name};
use deferrun_store::JobStore;

use crate::cli::OutputFormat;
use crate::open_store;

pub(crate) async fn add(
    config: &Config,
    data_dir: &Path,
    file: &Path,
    at: &str,
    kind: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config, data_dir).await?;
    let job = schedule_file(&store, file, at, kind, name).await?;
    println!("Scheduled {} ({}) for {}", job.id, job.display_name, job.due_at.to_rfc3339());
    Ok(())
}

pub(crate) async fn list(config: &Config, data_dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config, data_dir).await?;
    let jobs = store.load_all().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&jobs)?),
        OutputFormat::Table if jobs.is_empty() => println!("No jobs found."),
        OutputFormat::Table => print!("{}", render_table(&jobs)),
    }

    let unreadable = store.unreadable().await;
    if !unreadable.is_empty() {
        eprintln!("{} unreadable record(s) kept in the store:", unreadable.len());
        for record in unreadable {
            eprintln!("  {}: {}", record.label, record.reason);
        }
    }
    Ok(())
}

pub(crate) async fn delete(config: &Config, data_dir: &Path, id: &str) -> anyhow::Result<()> {
    let store = open_store(config, data_dir).await?;
    let job = store.delete(&parse_id(id)?).await?;
    println!("Deleted {} ({})", job.id, job.display_name);
    Ok(())
}

pub(crate) async fn cancel(config: &Config, data_dir: &Path, id: &str) -> anyhow::Result<()> {
    let store = open_store(config, data_dir).await?;
    let job = store
        .update_status(&parse_id(id)?, JobStatus::Cancelled, None)
        .await?;
    println!("Cancelled {} ({})", job.id, job.display_name);
    Ok(())
}

/// Read `file` and create a pending job for it.
async fn schedule_file(
    store: &JobStore,
    file: &Path,
    at: &str,
    kind: Option<String>,
    name: Option<String>,
) -> anyhow::Result<Job> {
    let due_at = parse_due(at)?;

    let display_name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", file.display()))?,
    };

    let kind = match kind.or_else(|| kind_from_name(&display_name)) {
        Some(kind) => kind,
        None => bail!("cannot infer a kind from '{}'; pass --kind", display_name),
    };

    let payload = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    Ok(store.create(&display_name, &payload, &kind, due_at).await?)
}

fn parse_due(at: &str) -> anyhow::Result<DateTime<Utc>> {
    let due = DateTime::parse_from_rfc3339(at)
        .with_context(|| format!("invalid due time '{}', expected RFC 3339", at))?;
    Ok(due.with_timezone(&Utc))
}

fn parse_id(id: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("invalid job id '{}'", id))
}

fn render_table(jobs: &[Job]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<24}  {:<6}  {:<25}  {:<9}  {}",
        "ID", "NAME", "KIND", "DUE", "STATUS", "EXECUTED"
    );
    let _ = writeln!(out, "{}", "-".repeat(130));
    for job in jobs {
        let executed = job
            .executed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<36}  {:<24}  {:<6}  {:<25}  {:<9}  {}",
            job.id,
            job.display_name,
            job.kind,
            job.due_at.to_rfc3339(),
            job.status.to_string(),
            executed
        );
    }
    out
}
