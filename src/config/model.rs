// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Workflow file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// continue_on_error = false
/// timeout_secs = 60
/// retries = 1
///
/// [task.build]
/// cmd = "make"
///
/// [task.test]
/// cmd = "make test"
/// after = ["build"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated workflow. Obtain one through `ConfigFile::try_from` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }
}

/// `[config]` section: the run policy used by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Record errors raised by commands as plain failures instead of
    /// stopping the branch that raised them.
    #[serde(default)]
    pub continue_on_error: bool,

    /// How long to wait for each pass before giving up on it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra reset-and-rerun passes while the graph ends failed.
    #[serde(default)]
    pub retries: u32,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            timeout_secs: default_timeout_secs(),
            retries: 0,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute.
    pub cmd: String,

    /// Run only after every task listed here succeeded.
    #[serde(default)]
    pub after: Vec<String>,

    /// Run after every task listed here finished, whatever the outcome.
    #[serde(default)]
    pub after_settled: Vec<String>,
}

impl TaskConfig {
    /// All predecessors, `after` first.
    pub fn predecessors(&self) -> impl Iterator<Item = &String> {
        self.after.iter().chain(self.after_settled.iter())
    }
}
