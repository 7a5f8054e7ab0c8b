// src/engine/mod.rs

//! Task execution engine.
//!
//! [`Engine`] owns everything a run needs:
//! - the [`TaskRegistry`]
//! - the context configuration (group and task layers under `tasks.*`)
//! - the [`CallStack`], behind a single run lock
//!
//! A run walks the dependency list depth first, left to right. For every
//! task it binds configuration, validates, then executes; the first error
//! aborts the whole run. A task reached twice in one run (a shared
//! dependency) only runs the first time.
//!
//! Only one top-level run is in flight at a time, so callers from
//! different threads (e.g. two watches) queue up on the lock.
//!
//! Executors must not call back into [`Engine::run_task`]: the run lock is
//! not re-entrant.

pub mod call_stack;
pub mod check;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, error, info};

use crate::config::{CONTEXT_TASKS_KEY, Config};
use crate::errors::{BudError, RegistrationError, Result};
use crate::task::{Executor, Task, TaskDef, TaskName, TaskRegistry};

pub use call_stack::{CallStack, RunPhase};
pub use check::GraphIssue;

/// Read-only description of a registered task, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub name: TaskName,
    pub usage: Option<String>,
    pub dependencies: Vec<TaskName>,
    pub aggregate: bool,
}

#[derive(Debug, Default)]
pub struct Engine {
    registry: RwLock<TaskRegistry>,
    context: RwLock<Config>,
    run_lock: Mutex<CallStack>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose context configuration starts as `context`.
    pub fn with_context(context: Config) -> Self {
        Self {
            context: RwLock::new(context),
            ..Self::default()
        }
    }

    /// Convenience for sharing with watches.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Register a task under `group.name`; visible to runs immediately.
    pub fn register(&self, def: TaskDef) -> std::result::Result<(), RegistrationError> {
        self.registry_mut().register(def).map(|_| ())
    }

    /// Make the tasks of `group` reachable by their short names.
    pub fn promote_group(&self, group: &str) -> usize {
        self.registry_mut().promote_group(group)
    }

    pub fn promote_groups<I, S>(&self, groups: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = self.registry_mut();
        groups
            .into_iter()
            .map(|g| registry.promote_group(g.as_ref()))
            .sum()
    }

    /// Merge `config` into the context configuration at `tasks.<key>`,
    /// where `key` is a group (`"go"`) or a task within a group
    /// (`"go.build"`).
    pub fn task_config(&self, key: &str, config: Config) -> Result<()> {
        if key.trim().is_empty() {
            return Err(BudError::Config("task config key is empty".to_string()));
        }
        let mut context = self.context.write().unwrap_or_else(PoisonError::into_inner);
        context.merge(&format!("{CONTEXT_TASKS_KEY}.{key}"), config);
        Ok(())
    }

    /// Snapshot of the context configuration.
    pub fn context(&self) -> Config {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Task>> {
        self.registry().resolve(name)
    }

    /// Registered tasks (aliases excluded), sorted by name.
    pub fn tasks(&self) -> Vec<TaskSummary> {
        self.registry()
            .tasks()
            .iter()
            .map(|t| TaskSummary {
                name: t.qualified_name().to_string(),
                usage: t.usage().map(str::to_string),
                dependencies: t.dependencies().to_vec(),
                aggregate: t.is_aggregate(),
            })
            .collect()
    }

    /// Depth of the call stack. Waits for any in-flight run, so outside a
    /// run this is always `0`.
    pub fn call_depth(&self) -> usize {
        self.lock_run().len()
    }

    pub fn run_task(&self, name: &str) -> Result<()> {
        self.run_task_with(name, None)
    }

    /// Run `name` and everything it depends on.
    ///
    /// `overrides` is the highest configuration layer and applies to the
    /// requested task only; its dependencies get their defaults, group and
    /// task layers.
    ///
    /// A panic anywhere in the graph is caught here and returned as
    /// [`BudError::Panicked`].
    pub fn run_task_with(&self, name: &str, overrides: Option<&Config>) -> Result<()> {
        if name.is_empty() {
            return Err(BudError::EmptyTaskName);
        }

        let mut stack = self.lock_run();
        stack.reset();
        info!(task = name, "running task");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.walk(&mut stack, name, overrides)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let task = stack.top().unwrap_or(name).to_string();
                let message = panic_message(payload.as_ref());
                error!(task = %task, phase = %stack.phase(), %message, "task panicked");
                Err(BudError::Panicked { task, message })
            }
        };

        match &result {
            Ok(()) => {
                stack.set_phase(RunPhase::Done);
                info!(task = name, "task finished");
            }
            Err(err) => {
                stack.set_phase(RunPhase::Failed);
                debug!(task = name, error = %err, "task run failed");
            }
        }
        stack.reset();
        result
    }

    fn walk(&self, stack: &mut CallStack, name: &str, overrides: Option<&Config>) -> Result<()> {
        stack.set_phase(RunPhase::Resolving);
        let task = self
            .lookup(name)
            .ok_or_else(|| BudError::TaskNotFound(name.to_string()))?;

        if stack.is_completed(task.qualified_name()) {
            debug!(task = %task.qualified_name(), "already ran in this run; skipped");
            return Ok(());
        }

        stack.push(task.qualified_name())?;
        let result = self.walk_task(stack, &task, overrides);
        stack.pop();
        if result.is_ok() {
            stack.complete(task.qualified_name());
        }
        result
    }

    fn walk_task(&self, stack: &mut CallStack, task: &Task, overrides: Option<&Config>) -> Result<()> {
        for dep in task.dependencies() {
            self.walk(stack, dep, None)?;
        }

        let Some(executor) = task.executor() else {
            debug!(task = %task.qualified_name(), "aggregation task; nothing to execute");
            return Ok(());
        };
        let mut executor = executor.lock().unwrap_or_else(PoisonError::into_inner);

        stack.set_phase(RunPhase::Configuring);
        self.configure(task, &mut executor, overrides);

        stack.set_phase(RunPhase::Validating);
        executor.validate().map_err(|source| BudError::Validation {
            task: task.qualified_name().to_string(),
            source,
        })?;

        stack.set_phase(RunPhase::Executing);
        debug!(task = %task.qualified_name(), executor = ?*executor, "executing task");
        executor.execute().map_err(|source| BudError::Execution {
            task: task.qualified_name().to_string(),
            source,
        })
    }

    /// Bind the four layers in precedence order: task defaults, group
    /// config, task config within the group, per-run overrides.
    fn configure(&self, task: &Task, executor: &mut Executor, overrides: Option<&Config>) {
        if let Executor::Func(_) = executor {
            return;
        }

        let mut assigned = 0;
        if let Some(defaults) = task.defaults() {
            assigned += executor.bind_layer(defaults);
        }

        let group_key = format!("{CONTEXT_TASKS_KEY}.{}", task.group());
        let group_config = self
            .context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sub_config(&group_key);
        if let Some(group_config) = group_config {
            assigned += executor.bind_layer(&group_config);
            if let Some(task_config) = group_config.sub_config(task.name()) {
                assigned += executor.bind_layer(&task_config);
            }
        }

        if let Some(overrides) = overrides {
            assigned += executor.bind_layer(overrides);
        }

        debug!(task = %task.qualified_name(), assigned, "configuration bound");
    }

    fn lock_run(&self) -> MutexGuard<'_, CallStack> {
        self.run_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, TaskRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, TaskRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bindable, FieldMap};
    use crate::task::StructuredExecutor;
    use std::sync::Mutex as StdMutex;

    fn journal() -> Arc<StdMutex<Vec<String>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn recording(group: &str, name: &str, log: &Arc<StdMutex<Vec<String>>>) -> TaskDef {
        let log = Arc::clone(log);
        let label = name.to_string();
        TaskDef::new(group, name).run(move || {
            log.lock().unwrap().push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn dependencies_run_left_to_right_before_the_task() {
        let engine = Engine::new();
        let log = journal();
        engine.register(recording("g", "a", &log)).unwrap();
        engine.register(recording("g", "b", &log)).unwrap();
        engine
            .register(recording("g", "c", &log).after(["g.a", "g.b"]))
            .unwrap();

        engine.run_task("g.c").unwrap();
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn unknown_task_is_reported() {
        let engine = Engine::new();
        let err = engine.run_task("nope").unwrap_err();
        assert!(matches!(err, BudError::TaskNotFound(ref n) if n == "nope"));
        assert!(matches!(engine.run_task(""), Err(BudError::EmptyTaskName)));
    }

    #[test]
    fn promoted_names_resolve() {
        let engine = Engine::new();
        let log = journal();
        engine.register(recording("go", "build", &log)).unwrap();
        engine.promote_group("go");
        engine.run_task("build").unwrap();
        assert_eq!(*log.lock().unwrap(), ["build"]);
    }

    #[test]
    fn failing_dependency_stops_the_run() {
        let engine = Engine::new();
        let log = journal();
        engine
            .register(TaskDef::new("g", "bad").run(|| anyhow::bail!("boom")))
            .unwrap();
        engine.register(recording("g", "after", &log)).unwrap();
        engine
            .register(recording("g", "top", &log).after(["g.bad", "g.after"]))
            .unwrap();

        let err = engine.run_task("g.top").unwrap_err();
        assert!(matches!(err, BudError::Execution { ref task, .. } if task == "g.bad"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn panics_become_errors_and_leave_the_engine_usable() {
        let engine = Engine::new();
        engine
            .register(TaskDef::new("g", "explode").run(|| panic!("kaboom")))
            .unwrap();
        engine.register(TaskDef::new("g", "fine").run(|| Ok(()))).unwrap();

        let err = engine.run_task("g.explode").unwrap_err();
        match err {
            BudError::Panicked { task, message } => {
                assert_eq!(task, "g.explode");
                assert!(message.contains("kaboom"));
            }
            other => panic!("expected Panicked, got {other:?}"),
        }
        assert_eq!(engine.call_depth(), 0);
        engine.run_task("g.fine").unwrap();
    }

    #[derive(Default)]
    struct Counter {
        num: i64,
        label: String,
        seen: Arc<StdMutex<Vec<(i64, String)>>>,
    }

    impl Bindable for Counter {
        fn fields(&mut self) -> FieldMap<'_> {
            FieldMap::new()
                .int("Num", &mut self.num)
                .string("A", &mut self.label)
        }
    }

    impl StructuredExecutor for Counter {
        fn validate(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn execute(&mut self) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((self.num, self.label.clone()));
            Ok(())
        }
    }

    #[test]
    fn configuration_layers_apply_lowest_to_highest() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let engine = Engine::new();
        engine
            .register(
                TaskDef::new("grp", "count")
                    .defaults(Config::new().with("num", 3))
                    .structured(Counter {
                        seen: Arc::clone(&seen),
                        ..Default::default()
                    }),
            )
            .unwrap();
        engine
            .task_config("grp", Config::new().with("num", 4).with("a", "x"))
            .unwrap();
        engine
            .task_config("grp.count", Config::new().with("num", 5))
            .unwrap();

        engine
            .run_task_with("grp.count", Some(&Config::new().with("num", 6)))
            .unwrap();
        engine.run_task("grp.count").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (6, "x".to_string()));
        // Without the override the task-level layer wins again.
        assert_eq!(seen[1], (5, "x".to_string()));
    }

    #[test]
    fn empty_task_config_key_is_rejected() {
        let engine = Engine::new();
        assert!(engine.task_config(" ", Config::new()).is_err());
    }
}
