// src/task/mod.rs

//! Task definitions and the task registry.
//!
//! - [`TaskDef`] is the registration builder (group, name, dependencies,
//!   executor, default configuration, usage).
//! - [`Task`] is the immutable registered form; only its executor's own
//!   fields change, when configuration is bound before a run.
//! - [`registry`] holds the name -> task map.
//! - [`executor`] holds the function and structured executor shapes.

pub mod executor;
pub mod registry;

use std::fmt;
use std::sync::Mutex;

use crate::config::Config;
use crate::errors::RegistrationError;

pub use executor::{Executor, FnExecutor, StructuredExecutor, TaskFn};
pub use registry::TaskRegistry;

/// Canonical task name type.
pub type TaskName = String;

/// A registered task.
pub struct Task {
    group: String,
    name: String,
    qualified: TaskName,
    dependencies: Vec<TaskName>,
    executor: Option<Mutex<Executor>>,
    defaults: Option<Config>,
    usage: Option<String>,
}

impl Task {
    /// `group.name`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn dependencies(&self) -> &[TaskName] {
        &self.dependencies
    }

    pub fn usage(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    pub fn defaults(&self) -> Option<&Config> {
        self.defaults.as_ref()
    }

    /// A task without executor only aggregates its dependencies.
    pub fn is_aggregate(&self) -> bool {
        self.executor.is_none()
    }

    pub(crate) fn executor(&self) -> Option<&Mutex<Executor>> {
        self.executor.as_ref()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.qualified)
            .field("dependencies", &self.dependencies)
            .field("aggregate", &self.is_aggregate())
            .finish_non_exhaustive()
    }
}

/// Registration builder.
///
/// ```
/// use bud::task::TaskDef;
///
/// let def = TaskDef::new("go", "build")
///     .after(["go.fmt", "go.vet"])
///     .usage("Build all packages.")
///     .run(|| Ok(()));
/// # let _ = def;
/// ```
pub struct TaskDef {
    group: String,
    name: String,
    dependencies: Vec<TaskName>,
    executor: Option<Executor>,
    defaults: Option<Config>,
    usage: Option<String>,
}

impl TaskDef {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            dependencies: Vec::new(),
            executor: None,
            defaults: None,
            usage: None,
        }
    }

    /// Dependencies, run left to right before this task.
    pub fn after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn usage(mut self, text: impl Into<String>) -> Self {
        self.usage = Some(text.into());
        self
    }

    /// Lowest-precedence configuration layer for this task's executor.
    pub fn defaults(mut self, config: Config) -> Self {
        self.defaults = Some(config);
        self
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Shorthand for a function executor.
    pub fn run<F>(self, runner: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.executor(Executor::func(runner))
    }

    /// Shorthand for a structured executor.
    pub fn structured<E>(self, executor: E) -> Self
    where
        E: StructuredExecutor + 'static,
    {
        self.executor(Executor::structured(executor))
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }

    pub(crate) fn build(self) -> Result<Task, RegistrationError> {
        if self.name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.executor.is_none() && self.dependencies.is_empty() {
            return Err(RegistrationError::NoWork {
                task: self.qualified_name(),
            });
        }

        Ok(Task {
            qualified: self.qualified_name(),
            group: self.group,
            name: self.name,
            dependencies: self.dependencies,
            executor: self.executor.map(Mutex::new),
            defaults: self.defaults,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_and_idle_tasks_do_not_build() {
        let err = TaskDef::new("g", "").run(|| Ok(())).build().unwrap_err();
        assert_eq!(err, RegistrationError::EmptyName);

        let err = TaskDef::new("g", "idle").build().unwrap_err();
        assert_eq!(err, RegistrationError::NoWork { task: "g.idle".into() });
    }

    #[test]
    fn aggregation_task_needs_only_dependencies() {
        let task = TaskDef::new("g", "all").after(["g.a", "g.b"]).build().unwrap();
        assert!(task.is_aggregate());
        assert_eq!(task.dependencies(), ["g.a", "g.b"]);
        assert_eq!(task.qualified_name(), "g.all");
    }
}
