// src/config/store.rs

use toml::{Table, Value};

use crate::errors::Result;

/// Hierarchical configuration tree backed by a TOML table.
///
/// Keys passed to the lookup helpers are dotted paths (`"tasks.go.build"`);
/// the empty key addresses the root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    table: Table,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        Self { table }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let table: Table = toml::from_str(source)?;
        Ok(Self { table })
    }

    /// Builder-style [`Config::set`].
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn as_table(&self) -> &Table {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Top-level keys of this (sub-)tree, in table order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(|k| k.as_str())
    }

    /// Top-level key/value pairs of this (sub-)tree.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = split_key(key);
        let first = parts.next()?;
        let mut current = self.table.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Sub-tree under `key`, or `None` when absent or not a table.
    pub fn sub_config(&self, key: &str) -> Option<Config> {
        if key.is_empty() {
            return Some(self.clone());
        }
        self.get(key)
            .and_then(Value::as_table)
            .map(|table| Config::from_table(table.clone()))
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Floats also accept integer values (`num = 3` reads as `3.0`).
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// A list of strings; `None` if any element is not a string.
    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Set `key` to `value`, creating intermediate tables as needed.
    /// Non-table values in the way are replaced.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let parts: Vec<&str> = split_key(key).collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };
        let table = descend_mut(&mut self.table, parents);
        table.insert((*last).to_string(), value.into());
    }

    /// Deep-merge `other` into the sub-tree at `key` (root when empty).
    /// Values from `other` win; tables are merged recursively.
    pub fn merge(&mut self, key: &str, other: Config) {
        let parts: Vec<&str> = split_key(key).collect();
        let table = descend_mut(&mut self.table, &parts);
        merge_tables(table, other.table);
    }

    /// Parse a command-line style value: anything TOML accepts as a value
    /// (`3`, `true`, `["a", "b"]`, `"quoted"`), otherwise a plain string.
    pub fn parse_value(raw: &str) -> Value {
        let raw = raw.trim();
        toml::from_str::<Table>(&format!("v = {raw}"))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .unwrap_or_else(|| Value::String(raw.to_string()))
    }
}

impl From<Table> for Config {
    fn from(table: Table) -> Self {
        Config::from_table(table)
    }
}

fn split_key(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|p| !p.is_empty())
}

fn descend_mut<'t>(mut table: &'t mut Table, parts: &[&str]) -> &'t mut Table {
    for part in parts {
        let entry = table
            .entry((*part).to_string())
            .or_insert(Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        table = match entry {
            Value::Table(t) => t,
            _ => unreachable!("entry was just made a table"),
        };
    }
    table
}

fn merge_tables(into: &mut Table, from: Table) {
    for (key, value) in from {
        match (into.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                into.insert(key, value);
            }
        }
    }
}
