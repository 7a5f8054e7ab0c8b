// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ProjectFile, RawProjectFile, TaskEntry, WatchEntry};
use crate::errors::{BudError, Result};
use crate::watch::Op;

impl TryFrom<RawProjectFile> for ProjectFile {
    type Error = BudError;

    fn try_from(raw: RawProjectFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_project(&raw)?;
        Ok(ProjectFile::new_unchecked(
            raw.promote,
            raw.task,
            raw.watch,
            raw.tasks,
        ))
    }
}

/// Checks the project file up front so that declaring its tasks and
/// watches later cannot hit a registration error.
///
/// Dependency names are *not* resolved here: they may point at tasks
/// registered elsewhere, and unknown names are a run-time error.
fn validate_raw_project(raw: &RawProjectFile) -> Result<()> {
    validate_tasks(&raw.task)?;
    for (index, watch) in raw.watch.iter().enumerate() {
        validate_watch(index, watch)?;
    }
    Ok(())
}

fn validate_tasks(tasks: &[TaskEntry]) -> Result<()> {
    let mut seen = HashSet::new();

    for task in tasks {
        if task.name.trim().is_empty() {
            return Err(BudError::Config(format!(
                "task in group '{}' has an empty name",
                task.group
            )));
        }
        if task.group.trim().is_empty() {
            return Err(BudError::Config(format!(
                "task '{}' has an empty group",
                task.name
            )));
        }
        if task.name.contains('.') {
            return Err(BudError::Config(format!(
                "task name '{}' must not contain '.'",
                task.name
            )));
        }
        if task.cmd.is_none() && task.after.is_empty() {
            return Err(BudError::Config(format!(
                "task '{}' needs a `cmd` or an `after` list",
                task.qualified_name()
            )));
        }
        if !seen.insert(task.qualified_name()) {
            return Err(BudError::Config(format!(
                "task '{}' is defined more than once",
                task.qualified_name()
            )));
        }
    }

    Ok(())
}

fn validate_watch(index: usize, watch: &WatchEntry) -> Result<()> {
    if watch.patterns.is_empty() {
        return Err(BudError::Config(format!(
            "[[watch]] #{} has no patterns",
            index + 1
        )));
    }
    if watch.tasks.is_empty() {
        return Err(BudError::Config(format!(
            "[[watch]] #{} has no tasks to run",
            index + 1
        )));
    }
    if let Some(ref skip) = watch.skip {
        for name in skip {
            if Op::parse_name(name).is_none() {
                return Err(BudError::Config(format!(
                    "[[watch]] #{} has unknown skip operation '{}' \
                     (expected create, write, remove, rename or chmod)",
                    index + 1,
                    name
                )));
            }
        }
    }
    Ok(())
}
