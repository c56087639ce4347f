// src/exec/command.rs

//! Shell-command work functions used by the `tasker` binary.
//!
//! Each `[task.<name>]` of a workflow file becomes a node whose work runs
//! `cmd` through the platform shell. Exit status 0 is success, any other
//! status is an outcome failure, and failing to start the shell is a raised
//! failure.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::dag::{Graph, GraphBuilder};
use crate::errors::Result;

/// Context shared by every command of a run.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Working directory for commands.
    pub workdir: PathBuf,
}

/// Build the work function for one task.
pub fn shell_work(
    task: &str,
    cmd: &str,
) -> impl Fn(&CommandContext) -> anyhow::Result<bool> + Send + Sync + 'static {
    let task = task.to_string();
    let cmd = cmd.to_string();

    move |ctx: &CommandContext| {
        info!(task = %task, cmd = %cmd, "starting task process");

        let output = shell(&cmd)
            .current_dir(&ctx.workdir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawning process for task '{task}'"))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(task = %task, "stdout: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(task = %task, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            task = %task,
            exit_code = code,
            success = output.status.success(),
            "task process exited"
        );
        Ok(output.status.success())
    }
}

// Build a shell command appropriate for the platform.
fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Turn a validated workflow into a graph of shell commands.
///
/// `after` entries become guards that block on failure, `after_settled`
/// entries guards that only wait for the predecessor to finish.
pub fn graph_from_config(cfg: &ConfigFile) -> Result<Graph<CommandContext>> {
    populate(GraphBuilder::new(), cfg).map(GraphBuilder::build)
}

/// Register every task of `cfg` on `builder` and wire its guards.
pub fn populate(
    mut builder: GraphBuilder<CommandContext>,
    cfg: &ConfigFile,
) -> Result<GraphBuilder<CommandContext>> {
    for (name, task) in cfg.task.iter() {
        builder.create(name.clone(), shell_work(name, &task.cmd))?;
    }

    for (name, task) in cfg.task.iter() {
        let id = builder.resolve(name)?;
        for dep in task.after.iter() {
            let pred = builder.resolve(dep)?;
            builder.add_dependency(pred, id, true)?;
        }
        for dep in task.after_settled.iter() {
            let pred = builder.resolve(dep)?;
            builder.add_dependency(pred, id, false)?;
        }
    }

    Ok(builder)
}
