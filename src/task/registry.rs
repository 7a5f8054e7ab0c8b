// src/task/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::RegistrationError;
use crate::task::{Task, TaskDef};

#[derive(Debug, Clone)]
struct Entry {
    task: Arc<Task>,
    /// True for short names added by [`TaskRegistry::promote_group`].
    alias: bool,
}

/// Append-only map of task name -> task.
///
/// Every task lives under its qualified `group.name`. Promoting a group
/// adds extra alias entries under the bare names; the qualified entries
/// always remain.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: HashMap<String, Entry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TaskDef) -> Result<Arc<Task>, RegistrationError> {
        let task = def.build()?;
        let qualified = task.qualified_name().to_string();

        if self.entries.contains_key(&qualified) {
            return Err(RegistrationError::Duplicate { task: qualified });
        }

        let task = Arc::new(task);
        self.entries.insert(
            qualified.clone(),
            Entry {
                task: Arc::clone(&task),
                alias: false,
            },
        );
        debug!(task = %qualified, "registered task");
        Ok(task)
    }

    /// Make every task of `group` reachable by its bare name.
    ///
    /// A bare name that is already a qualified entry is left alone; an
    /// existing alias from an earlier promotion is replaced. Returns the
    /// number of aliases added or replaced.
    pub fn promote_group(&mut self, group: &str) -> usize {
        let prefix = format!("{group}.");
        let promoted: Vec<(String, Arc<Task>)> = self
            .entries
            .iter()
            .filter(|(name, entry)| !entry.alias && name.starts_with(&prefix))
            .map(|(name, entry)| (name[prefix.len()..].to_string(), Arc::clone(&entry.task)))
            .collect();

        let mut count = 0;
        for (short, task) in promoted {
            match self.entries.get(&short) {
                Some(existing) if !existing.alias => {
                    warn!(
                        alias = %short,
                        task = %task.qualified_name(),
                        "short name is already a qualified task; not promoted"
                    );
                    continue;
                }
                Some(existing) => {
                    debug!(
                        alias = %short,
                        previous = %existing.task.qualified_name(),
                        task = %task.qualified_name(),
                        "replacing promoted alias"
                    );
                }
                None => {}
            }
            self.entries.insert(short, Entry { task, alias: true });
            count += 1;
        }

        debug!(group, count, "promoted group");
        count
    }

    /// Look up a qualified or promoted name.
    pub fn resolve(&self, name: &str) -> Option<Arc<Task>> {
        self.entries.get(name).map(|e| Arc::clone(&e.task))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered tasks (aliases excluded), sorted by qualified name.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        let mut tasks: Vec<Arc<Task>> = self
            .entries
            .values()
            .filter(|e| !e.alias)
            .map(|e| Arc::clone(&e.task))
            .collect();
        tasks.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        tasks
    }

    /// Number of registered tasks, aliases excluded.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| !e.alias).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(group: &str, name: &str) -> TaskDef {
        TaskDef::new(group, name).run(|| Ok(()))
    }

    #[test]
    fn duplicate_qualified_names_are_rejected() {
        let mut reg = TaskRegistry::new();
        reg.register(noop("g", "a")).unwrap();
        let err = reg.register(noop("g", "a")).unwrap_err();
        assert_eq!(err, RegistrationError::Duplicate { task: "g.a".into() });

        // Same short name in another group is fine.
        reg.register(noop("h", "a")).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn promotion_adds_aliases_without_removing_originals() {
        let mut reg = TaskRegistry::new();
        reg.register(noop("go", "build")).unwrap();
        reg.register(noop("go", "test")).unwrap();
        reg.register(noop("gox", "build")).unwrap();

        assert!(reg.resolve("build").is_none());
        assert_eq!(reg.promote_group("go"), 2);

        let build = reg.resolve("build").unwrap();
        assert_eq!(build.qualified_name(), "go.build");
        assert!(reg.resolve("go.build").is_some());
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.tasks().len(), 3);
    }

    #[test]
    fn later_promotion_replaces_alias() {
        let mut reg = TaskRegistry::new();
        reg.register(noop("a", "fmt")).unwrap();
        reg.register(noop("b", "fmt")).unwrap();

        reg.promote_group("a");
        reg.promote_group("b");
        assert_eq!(reg.resolve("fmt").unwrap().group(), "b");
    }
}
