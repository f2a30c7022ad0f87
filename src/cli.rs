// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `dagflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagflow",
    version,
    about = "Run DAGs of dependent tasks with retries, trigger rules and bounded parallelism.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Dagflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Run only this DAG. Without it every DAG runs, in id order.
    #[arg(long, value_name = "ID")]
    pub dag: Option<String>,

    /// Logical date of the run (RFC 3339). Defaults to now.
    #[arg(long, value_name = "RFC3339", value_parser = parse_logical_date)]
    pub logical_date: Option<DateTime<Utc>>,

    /// Override `[config].parallelism`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub parallelism: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print DAGs, but don't execute any tasks.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// `--logical-date`, or the current time truncated to whole seconds.
    pub fn effective_logical_date(&self) -> DateTime<Utc> {
        self.logical_date.unwrap_or_else(|| Utc::now().trunc_subsecs(0))
    }
}

fn parse_logical_date(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 date '{s}': {e}"))
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
