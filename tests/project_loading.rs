// tests/project_loading.rs
mod common;
use crate::common::init_tracing;

use bud::config::load_and_validate;
use bud::engine::GraphIssue;
use bud::errors::BudError;
use bud_test_utils::builders::{ProjectBuilder, TaskBuilder};
use tempfile::tempdir;

#[test]
fn project_tasks_are_registered_promoted_and_listed() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = ProjectBuilder::new()
        .promote("go")
        .task(TaskBuilder::new("go", "fmt").cmd("true").usage("format sources"))
        .task(TaskBuilder::new("go", "build").cmd("true").after("go.fmt"))
        .task(TaskBuilder::new("ci", "all").after("build"))
        .write_to(dir.path());

    let project = load_and_validate(&path).unwrap();
    let engine = bud::build_engine(&project).unwrap();

    let tasks = engine.tasks();
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["ci.all", "go.build", "go.fmt"]);
    let fmt = tasks.iter().find(|t| t.name == "go.fmt").unwrap();
    assert_eq!(fmt.usage.as_deref(), Some("format sources"));
    assert!(tasks.iter().find(|t| t.name == "ci.all").unwrap().aggregate);

    // `build` only resolves through the promoted alias.
    assert!(engine.lookup("build").is_some());
    assert!(engine.check_graph().is_empty());
}

#[test]
fn check_reports_unknown_dependencies_from_the_file() {
    let dir = tempdir().unwrap();
    let path = ProjectBuilder::new()
        .task(TaskBuilder::new("web", "css").cmd("true").after("web.sass"))
        .write_to(dir.path());

    let project = load_and_validate(&path).unwrap();
    let engine = bud::build_engine(&project).unwrap();
    assert_eq!(
        engine.check_graph(),
        vec![GraphIssue::UnknownDependency {
            task: "web.css".into(),
            dependency: "web.sass".into(),
        }]
    );
    assert!(matches!(
        engine.run_task("web.css"),
        Err(BudError::TaskNotFound(_))
    ));
}

#[test]
fn invalid_declarations_are_rejected_at_load_time() {
    let dir = tempdir().unwrap();
    let path = ProjectBuilder::new()
        .task(TaskBuilder::new("web", "idle"))
        .write_to(dir.path());

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, BudError::Config(_)), "{err}");
}

#[cfg(unix)]
#[test]
fn shell_tasks_run_in_the_project_root_with_context_configuration() {
    let dir = tempdir().unwrap();
    let path = ProjectBuilder::new()
        .promote("sh")
        .task(
            TaskBuilder::new("sh", "greet")
                .cmd("printf '%s' \"$GREETING\" > greeting.txt")
                .default_value("quiet", "true"),
        )
        .raw("[tasks.sh.greet]\nenv = [\"GREETING=hello\"]")
        .write_to(dir.path());

    let project = load_and_validate(&path).unwrap();
    let engine = bud::build_engine(&project).unwrap();
    bud::run_tasks(&engine, &["greet".to_string()], None).unwrap();

    let written = std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap();
    assert_eq!(written, "hello");
}

#[cfg(unix)]
#[test]
fn failing_command_stops_the_remaining_tasks() {
    let dir = tempdir().unwrap();
    let path = ProjectBuilder::new()
        .task(TaskBuilder::new("sh", "fail").cmd("exit 2"))
        .task(TaskBuilder::new("sh", "touch").cmd("touch touched"))
        .write_to(dir.path());

    let project = load_and_validate(&path).unwrap();
    let engine = bud::build_engine(&project).unwrap();
    let err = bud::run_tasks(&engine, &["sh.fail".into(), "sh.touch".into()], None).unwrap_err();

    assert!(format!("{err:#}").contains("status 2"), "{err:#}");
    assert!(!dir.path().join("touched").exists());
}
