// src/config/model.rs

use serde::Deserialize;
use toml::Table;

/// Raw `Bud.toml` as deserialized, before semantic validation.
///
/// ```toml
/// promote = ["go"]
///
/// [[task]]
/// group = "go"
/// name = "build"
/// cmd = "go build ./..."
/// after = ["go.fmt"]
/// usage = "Build all packages."
/// [task.defaults]
/// quiet = true
///
/// [[watch]]
/// patterns = ["**/*.go", "!vendor/**"]
/// tasks = ["go.build"]
/// wait_ms = 200
///
/// [tasks.go]
/// env = ["CGO_ENABLED=0"]
/// [tasks.go.build]
/// retries = 1
/// ```
///
/// The free-form `[tasks.*]` tree is the context configuration from which
/// group-level and task-level layers are read at run time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProjectFile {
    /// Groups whose tasks become reachable by their short name.
    #[serde(default)]
    pub promote: Vec<String>,

    #[serde(default)]
    pub task: Vec<TaskEntry>,

    #[serde(default)]
    pub watch: Vec<WatchEntry>,

    #[serde(default)]
    pub tasks: Table,
}

/// One `[[task]]` entry. A task with a `cmd` is backed by a shell
/// executor; a task without one is a pure aggregation node.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub group: String,
    pub name: String,

    #[serde(default)]
    pub cmd: Option<String>,

    /// Dependencies, run left to right before this task.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub usage: Option<String>,

    /// Default configuration, the lowest binding layer.
    #[serde(default)]
    pub defaults: Table,
}

impl TaskEntry {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }
}

/// One `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEntry {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub base_dir: Option<String>,

    #[serde(default)]
    pub tasks: Vec<String>,

    /// Operation names to ignore (`create`, `write`, `remove`, `rename`,
    /// `chmod`). `None` keeps the default of skipping `chmod`.
    #[serde(default)]
    pub skip: Option<Vec<String>>,

    /// Debounce interval; `0` dispatches every event immediately.
    #[serde(default)]
    pub wait_ms: Option<u64>,

    /// Collapse buffered events for the same path.
    #[serde(default)]
    pub merge: Option<bool>,
}

/// Validated project file. Construct via `ProjectFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    promote: Vec<String>,
    task: Vec<TaskEntry>,
    watch: Vec<WatchEntry>,
    tasks: Table,
}

impl ProjectFile {
    pub(crate) fn new_unchecked(
        promote: Vec<String>,
        task: Vec<TaskEntry>,
        watch: Vec<WatchEntry>,
        tasks: Table,
    ) -> Self {
        Self {
            promote,
            task,
            watch,
            tasks,
        }
    }

    pub fn promote(&self) -> &[String] {
        &self.promote
    }

    pub fn task_entries(&self) -> &[TaskEntry] {
        &self.task
    }

    pub fn watch_entries(&self) -> &[WatchEntry] {
        &self.watch
    }

    /// The `[tasks.*]` context tree.
    pub fn context_tasks(&self) -> &Table {
        &self.tasks
    }
}
