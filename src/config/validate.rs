// src/config/validate.rs

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TaskerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskerError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.timeout_secs == 0 {
        return Err(TaskerError::ConfigError(
            "[config].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.predecessors() {
            if !cfg.task.contains_key(dep) {
                return Err(TaskerError::UnresolvedReference(dep.clone()));
            }
            if dep == name {
                return Err(TaskerError::CyclicDependency {
                    predecessor: name.clone(),
                    successor: name.clone(),
                });
            }
        }
        if let Some(dup) = task.after.iter().find(|d| task.after_settled.contains(d)) {
            return Err(TaskerError::ConfigError(format!(
                "task '{}' lists '{}' in both `after` and `after_settled`",
                name, dup
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task. For
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.predecessors() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            // Name the edge into `node` that lies on the cycle.
            let predecessor = cfg.task[node]
                .predecessors()
                .find(|dep| has_path_connecting(&graph, node, dep.as_str(), None))
                .map(|dep| dep.to_string())
                .unwrap_or_else(|| node.to_string());
            Err(TaskerError::CyclicDependency {
                predecessor,
                successor: node.to_string(),
            })
        }
    }
}
