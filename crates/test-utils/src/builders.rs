use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Builds the text of a `Bud.toml` to simplify test setup.
#[derive(Debug, Clone, Default)]
pub struct ProjectBuilder {
    promote: Vec<String>,
    body: String,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn promote(mut self, group: &str) -> Self {
        self.promote.push(group.to_string());
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.body.push_str(&task.to_toml());
        self
    }

    pub fn watch(mut self, patterns: &[&str], tasks: &[&str], wait_ms: u64) -> Self {
        let _ = write!(
            self.body,
            "\n[[watch]]\npatterns = {}\ntasks = {}\nwait_ms = {wait_ms}\n",
            array(patterns),
            array(tasks)
        );
        self
    }

    /// Append raw TOML, e.g. a `[tasks.<group>]` table.
    pub fn raw(mut self, toml: &str) -> Self {
        self.body.push('\n');
        self.body.push_str(toml);
        self.body.push('\n');
        self
    }

    pub fn to_toml(&self) -> String {
        let strs: Vec<&str> = self.promote.iter().map(String::as_str).collect();
        format!("promote = {}\n{}", array(&strs), self.body)
    }

    /// Write `Bud.toml` into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("Bud.toml");
        std::fs::write(&path, self.to_toml()).expect("writing Bud.toml");
        path
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    group: String,
    name: String,
    cmd: Option<String>,
    after: Vec<String>,
    usage: Option<String>,
    defaults: Vec<String>,
}

impl TaskBuilder {
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            cmd: None,
            after: Vec::new(),
            usage: None,
            defaults: Vec::new(),
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.cmd = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.after.push(dep.to_string());
        self
    }

    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = Some(usage.to_string());
        self
    }

    /// Add a `key = <toml value>` line to `[task.defaults]`.
    pub fn default_value(mut self, key: &str, toml_value: &str) -> Self {
        self.defaults.push(format!("{key} = {toml_value}"));
        self
    }

    fn to_toml(&self) -> String {
        let mut out = String::from("\n[[task]]\n");
        let _ = writeln!(out, "group = {:?}", self.group);
        let _ = writeln!(out, "name = {:?}", self.name);
        if let Some(cmd) = &self.cmd {
            let _ = writeln!(out, "cmd = {cmd:?}");
        }
        let after: Vec<&str> = self.after.iter().map(String::as_str).collect();
        let _ = writeln!(out, "after = {}", array(&after));
        if let Some(usage) = &self.usage {
            let _ = writeln!(out, "usage = {usage:?}");
        }
        if !self.defaults.is_empty() {
            out.push_str("[task.defaults]\n");
            for line in &self.defaults {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

fn array(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("{s:?}")).collect();
    format!("[{}]", quoted.join(", "))
}
