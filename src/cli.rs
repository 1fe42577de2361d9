//! CLI definitions for deferrun.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// deferrun CLI.
#[derive(Parser)]
#[command(name = "deferrun")]
#[command(about = "Run each uploaded job exactly once at its due time")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.deferrun/config.toml if present)
    #[arg(short, long, env = "DEFERRUN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overrides `[store] data_dir`
    #[arg(short, long, env = "DEFERRUN_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Recover persisted jobs and fire them until interrupted (default)
    Run,

    /// Schedule a file to run at a given time
    ///
    /// Offline: do not use while `run` owns the same data directory.
    Add {
        /// Payload file
        file: PathBuf,

        /// Due time, RFC 3339 (e.g. 2026-01-31T18:00:00Z)
        #[arg(long)]
        at: String,

        /// Job kind (default: the file extension)
        #[arg(long)]
        kind: Option<String>,

        /// Display name (default: the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List all jobs by due time
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Remove a job and its payload
    ///
    /// Offline: do not use while `run` owns the same data directory.
    Delete {
        /// Job ID
        id: String,
    },

    /// Mark a pending job as cancelled, keeping its record
    ///
    /// Offline: do not use while `run` owns the same data directory.
    Cancel {
        /// Job ID
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
