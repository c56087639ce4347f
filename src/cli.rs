// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tasker`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tasker",
    version,
    about = "Run a DAG of shell commands with dependency guards and retries.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Tasker.toml")]
    pub config: String,

    /// Record command errors as task failures instead of stopping the
    /// branch that raised them. Overrides `[config].continue_on_error`.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Seconds to wait for each pass. Overrides `[config].timeout_secs`.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra reset-and-rerun passes while tasks fail. Overrides
    /// `[config].retries`.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the DAG, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
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
