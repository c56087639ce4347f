// tests/config_workflows.rs
//
// Workflow files: validation errors and shell-command graphs.

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::{WAIT, init_tracing};

use std::io::Write;

use tempfile::NamedTempFile;
use tasker::config::{ConfigFile, load_and_validate};
use tasker::errors::TaskerError;

#[test]
fn test_dag_cycle_returns_structured_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(TaskerError::CyclicDependency {
            predecessor,
            successor,
        }) => {
            assert_ne!(predecessor, successor);
            assert!(["A", "B"].contains(&predecessor.as_str()));
        }
        Err(e) => panic!("Expected CyclicDependency error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_is_unresolved() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.A]
cmd = "echo A"
after_settled = ["NonExistent"]
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(TaskerError::UnresolvedReference(name)) => assert_eq!(name, "NonExistent"),
        Err(e) => panic!("Expected UnresolvedReference, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_defaults_are_applied() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.only]
cmd = "true"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert!(!cfg.config.continue_on_error);
    assert_eq!(cfg.config.timeout_secs, 60);
    assert_eq!(cfg.config.retries, 0);
    assert!(cfg.task["only"].after.is_empty());
}

#[test]
fn test_bad_toml_is_a_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[task.A\ncmd = 1").unwrap();
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskerError::TomlError(_))
    ));
}

#[test]
fn test_builder_config_rejects_self_dependency() {
    let raw = ConfigFileBuilder::new()
        .with_task("A", TaskConfigBuilder::new("true").after("A").build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(TaskerError::CyclicDependency { .. })
    ));
}

#[cfg(unix)]
mod shell {
    use super::*;

    use tasker::cli::CliArgs;
    use tasker::dag::NodeState;
    use tasker::exec::{CommandContext, graph_from_config};

    fn context(dir: &tempfile::TempDir) -> CommandContext {
        CommandContext {
            workdir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn commands_share_the_working_directory() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();

        let cfg = ConfigFileBuilder::new()
            .with_task("write", TaskConfigBuilder::new("echo hi > out.txt").build())
            .with_task(
                "read",
                TaskConfigBuilder::new("grep -q hi out.txt").after("write").build(),
            )
            .build();

        let graph = graph_from_config(&cfg).unwrap();
        assert!(graph.run(context(&dir)).wait(WAIT));

        assert_eq!(graph.state_of("write"), Some(NodeState::Succeeded));
        assert_eq!(graph.state_of("read"), Some(NodeState::Succeeded));
    }

    #[test]
    fn non_zero_exit_is_an_outcome_failure() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();

        let cfg = ConfigFileBuilder::new()
            .with_task("bad", TaskConfigBuilder::new("exit 3").build())
            .with_task("gated", TaskConfigBuilder::new("true").after("bad").build())
            .with_task(
                "report",
                TaskConfigBuilder::new("true").after_settled("bad").build(),
            )
            .build();

        let graph = graph_from_config(&cfg).unwrap();
        let handle = graph.run(context(&dir));
        assert!(handle.wait(WAIT));

        assert!(!handle.has_errors());
        assert_eq!(graph.state_of("bad"), Some(NodeState::Failed));
        assert_eq!(graph.last_error_of("bad"), None);
        assert_eq!(graph.state_of("gated"), Some(NodeState::Idle));
        assert_eq!(graph.state_of("report"), Some(NodeState::Succeeded));
    }

    fn args(path: &std::path::Path, retries: Option<u32>) -> CliArgs {
        CliArgs {
            config: path.display().to_string(),
            continue_on_error: false,
            timeout: Some(10),
            retries,
            log_level: None,
            dry_run: false,
        }
    }

    fn write_workflow(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("Tasker.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    // Fails on its first invocation in a directory, succeeds afterwards.
    const FLAKY: &str = r#"
[task.flaky]
cmd = "if [ -f marker ]; then exit 0; else touch marker; exit 1; fi"

[task.after]
cmd = "test -f marker"
after = ["flaky"]
"#;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cli_run_fails_without_retries() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = write_workflow(&dir, FLAKY);

        let err = tasker::run(args(&path, Some(0))).await.unwrap_err();
        assert!(err.to_string().contains("flaky"));
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cli_run_retries_failed_tasks() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = write_workflow(&dir, FLAKY);

        tasker::run(args(&path, Some(1))).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cli_dry_run_executes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workflow(
            &dir,
            r#"
[task.touch]
cmd = "touch ran"
"#,
        );

        let mut a = args(&path, None);
        a.dry_run = true;
        tasker::run(a).await.unwrap();
        assert!(!dir.path().join("ran").exists());
    }
}
