// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod task;
pub mod watch;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command, overrides_config};
use crate::config::{Config, Project, TaskEntry, WatchEntry, load_and_validate};
use crate::engine::Engine;
use crate::errors::{RegistrationError, exit_on_registration_error};
use crate::exec::ShellExecutor;
use crate::task::TaskDef;
use crate::watch::{Op, WatchDef, WatchManager, skip_op};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - project loading (user + project configuration)
/// - task registration and group promotion
/// - the requested subcommand
pub async fn run(args: CliArgs) -> Result<()> {
    let project = load_and_validate(&args.file)?;
    let engine = Arc::new(exit_on_registration_error(build_engine(&project)));

    match args.command {
        Command::Run { tasks, overrides } => {
            let overrides = overrides_config(&overrides);
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || run_tasks(&engine, &tasks, overrides.as_ref()))
                .await??;
            Ok(())
        }
        Command::List => {
            print_tasks(&engine);
            Ok(())
        }
        Command::Check => check(&engine),
        Command::Watch => {
            let mut manager = WatchManager::new(Arc::clone(&engine));
            for entry in project.file.watch_entries() {
                exit_on_registration_error(manager.register(watch_def(&project.root, entry)));
            }
            if manager.watches().is_empty() {
                bail!("no [[watch]] entries in {:?}", args.file);
            }
            manager.start_all().await?;
            Ok(())
        }
    }
}

/// Register every `[[task]]` of `project` and promote its groups.
pub fn build_engine(project: &Project) -> std::result::Result<Engine, RegistrationError> {
    let engine = Engine::with_context(project.context.clone());
    for entry in project.file.task_entries() {
        engine.register(task_def(&project.root, entry))?;
    }
    let promoted = engine.promote_groups(project.file.promote());
    debug!(tasks = engine.tasks().len(), promoted, "project registered");
    Ok(engine)
}

fn task_def(root: &Path, entry: &TaskEntry) -> TaskDef {
    let mut def = TaskDef::new(&entry.group, &entry.name).after(entry.after.iter().cloned());
    if let Some(usage) = &entry.usage {
        def = def.usage(usage);
    }
    if !entry.defaults.is_empty() {
        def = def.defaults(Config::from_table(entry.defaults.clone()));
    }
    if let Some(cmd) = &entry.cmd {
        let mut shell = ShellExecutor::new(cmd);
        shell.dir = root.to_string_lossy().into_owned();
        def = def.structured(shell);
    }
    def
}

fn watch_def(root: &Path, entry: &WatchEntry) -> WatchDef {
    let base_dir = match &entry.base_dir {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };
    let mut def = WatchDef::new(entry.patterns.iter().cloned())
        .base_dir(base_dir)
        .tasks(entry.tasks.iter().cloned());
    if let Some(names) = &entry.skip {
        def = def.skip(skip_op(names.iter().filter_map(|n| Op::parse_name(n))));
    }
    if let Some(ms) = entry.wait_ms {
        def = def.wait(Duration::from_millis(ms));
    }
    if let Some(merge) = entry.merge {
        def = def.merge(merge);
    }
    def
}

/// Run `tasks` one after another; stop at the first failure. The override
/// layer applies to each requested task, not to its dependencies.
pub fn run_tasks(engine: &Engine, tasks: &[String], overrides: Option<&Config>) -> Result<()> {
    for task in tasks {
        engine.run_task_with(task, overrides)?;
        info!(task = %task, "done");
    }
    Ok(())
}

fn print_tasks(engine: &Engine) {
    let tasks = engine.tasks();
    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for task in tasks {
        let usage = task.usage.as_deref().unwrap_or("");
        println!("{:width$}  {}", task.name, usage, width = width);
        if !task.dependencies.is_empty() {
            println!("{:width$}    after: {}", "", task.dependencies.join(", "), width = width);
        }
    }
}

fn check(engine: &Engine) -> Result<()> {
    let issues = engine.check_graph();
    if issues.is_empty() {
        println!("ok: {} tasks", engine.tasks().len());
        return Ok(());
    }
    for issue in &issues {
        println!("{issue}");
    }
    bail!("{} problem(s) found", issues.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_names_become_a_mask_and_base_dir_is_rooted() {
        let entry = WatchEntry {
            patterns: vec!["**/*.rs".into()],
            base_dir: Some("src".into()),
            tasks: vec!["build".into()],
            skip: Some(vec!["chmod".into(), "remove".into()]),
            wait_ms: Some(0),
            merge: Some(false),
        };
        let watch = watch_def(Path::new("/proj"), &entry).build().unwrap();
        assert_eq!(watch.base_dir(), Path::new("/proj/src"));
        assert_eq!(watch.skip_mask(), Op::CHMOD | Op::REMOVE);
        assert!(watch.wait().is_zero());
        assert!(!watch.merges());
    }
}
