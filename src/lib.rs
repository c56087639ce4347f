// src/lib.rs

//! In-process DAG task executor.
//!
//! A [`Graph`](dag::Graph) holds named nodes joined by guards. Running the
//! graph launches every node whose guards pass on its own unit of
//! concurrency; each finished node sweeps the graph again so that newly
//! eligible successors start. Failed nodes can be reset and re-run while
//! succeeded nodes stay done.
//!
//! ```no_run
//! use std::time::Duration;
//! use tasker::dag::Graph;
//!
//! # fn main() -> tasker::errors::Result<()> {
//! let mut builder = Graph::<()>::builder();
//! let fetch = builder.create("fetch", |_| Ok(true))?;
//! let build = builder.create("build", |_| Ok(true))?;
//! builder.continue_with(fetch, build)?;
//!
//! let graph = builder.build();
//! graph.run(()).wait(Duration::from_secs(30));
//! assert!(!graph.is_failed());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod events;
pub mod exec;
pub mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::dag::RunOptions;
use crate::exec::{CommandContext, graph_from_config};

/// High-level entry point used by `main.rs`.
///
/// Loads the workflow, builds the command graph, runs it and, while tasks
/// end failed and retries remain, resets and re-runs it.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let graph = graph_from_config(&cfg)?;
    let context = std::sync::Arc::new(CommandContext {
        workdir: config_root_dir(&config_path),
    });
    let options = RunOptions {
        continue_on_error: cfg.config.continue_on_error,
    };
    let timeout = Duration::from_secs(cfg.config.timeout_secs);

    let mut attempt: u32 = 0;
    loop {
        let handle = graph.run_with(context.clone(), options);

        if !handle.wait_async(timeout).await {
            bail!(
                "workflow still running after {}s; unfinished tasks: {:?}",
                timeout.as_secs(),
                graph.unfinished()
            );
        }

        for err in handle.take_errors() {
            error!(run_id = handle.run_id(), error = %err, "task error");
        }

        if !graph.is_failed() {
            info!(attempts = attempt + 1, "all tasks succeeded");
            return Ok(());
        }

        if attempt >= cfg.config.retries {
            bail!("workflow failed; failed tasks: {:?}", graph.failed());
        }

        attempt += 1;
        let reopened = graph.reset();
        info!(attempt, reopened, "retrying failed tasks");
    }
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if args.continue_on_error {
        cfg.config.continue_on_error = true;
    }
    if let Some(secs) = args.timeout {
        cfg.config.timeout_secs = secs.max(1);
    }
    if let Some(retries) = args.retries {
        cfg.config.retries = retries;
    }
}

/// Directory commands run in.
///
/// - If the config path has a non-empty parent (e.g. "flows/Tasker.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Tasker.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print policy, tasks, guards and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("tasker dry-run");
    println!("  config.continue_on_error = {}", cfg.config.continue_on_error);
    println!("  config.timeout_secs = {}", cfg.config.timeout_secs);
    println!("  config.retries = {}", cfg.config.retries);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.after_settled.is_empty() {
            println!("      after_settled: {:?}", task.after_settled);
        }
    }

    debug!("dry-run complete (no execution)");
}
