// src/config/bind.rs

//! Projection of configuration layers onto executor fields.
//!
//! An executor opts in by implementing [`Bindable`] and listing its
//! settable fields in a [`FieldMap`]. Binding looks up each key of a
//! configuration layer, finds the field with the same name (compared after
//! upper-casing the first character on both sides, so `baseDir` targets a
//! field declared as `BaseDir` or `baseDir`) and assigns the value when the
//! types line up. Unknown keys and type mismatches are skipped silently.

use toml::Value;
use tracing::trace;

use crate::config::Config;

/// Mutable view of one executor field.
#[derive(Debug)]
pub enum FieldSlot<'a> {
    Str(&'a mut String),
    Bool(&'a mut bool),
    Int(&'a mut i64),
    Float(&'a mut f64),
    Strings(&'a mut Vec<String>),
}

#[derive(Debug)]
struct Field<'a> {
    name: &'static str,
    slot: FieldSlot<'a>,
}

/// Name -> slot table returned by [`Bindable::fields`].
#[derive(Debug, Default)]
pub struct FieldMap<'a> {
    fields: Vec<Field<'a>>,
}

impl<'a> FieldMap<'a> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn string(self, name: &'static str, slot: &'a mut String) -> Self {
        self.push(name, FieldSlot::Str(slot))
    }

    pub fn bool(self, name: &'static str, slot: &'a mut bool) -> Self {
        self.push(name, FieldSlot::Bool(slot))
    }

    pub fn int(self, name: &'static str, slot: &'a mut i64) -> Self {
        self.push(name, FieldSlot::Int(slot))
    }

    pub fn float(self, name: &'static str, slot: &'a mut f64) -> Self {
        self.push(name, FieldSlot::Float(slot))
    }

    pub fn strings(self, name: &'static str, slot: &'a mut Vec<String>) -> Self {
        self.push(name, FieldSlot::Strings(slot))
    }

    pub fn push(mut self, name: &'static str, slot: FieldSlot<'a>) -> Self {
        self.fields.push(Field { name, slot });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut FieldSlot<'a>> {
        let wanted = leading_capital(key);
        self.fields
            .iter_mut()
            .find(|f| leading_capital(f.name) == wanted)
            .map(|f| &mut f.slot)
    }
}

/// Executors whose fields can be targeted by configuration.
pub trait Bindable {
    fn fields(&mut self) -> FieldMap<'_>;
}

/// Apply one configuration layer to `target`.
///
/// Returns the number of fields that were assigned. Never fails.
pub fn bind<B: Bindable + ?Sized>(config: &Config, target: &mut B) -> usize {
    let mut fields = target.fields();
    let mut assigned = 0;

    for (key, value) in config.entries() {
        match fields.find_mut(key) {
            Some(slot) => {
                if assign(slot, value) {
                    assigned += 1;
                } else {
                    trace!(key, value_type = value.type_str(), "type mismatch; key skipped");
                }
            }
            None => trace!(key, "no field for key; skipped"),
        }
    }

    assigned
}

fn assign(slot: &mut FieldSlot<'_>, value: &Value) -> bool {
    match (slot, value) {
        (FieldSlot::Str(target), Value::String(v)) => **target = v.clone(),
        (FieldSlot::Bool(target), Value::Boolean(v)) => **target = *v,
        (FieldSlot::Int(target), Value::Integer(v)) => **target = *v,
        (FieldSlot::Float(target), Value::Float(v)) => **target = *v,
        (FieldSlot::Float(target), Value::Integer(v)) => **target = *v as f64,
        (FieldSlot::Strings(target), Value::Array(items)) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            match strings {
                Some(strings) => **target = strings,
                None => return false,
            }
        }
        _ => return false,
    }
    true
}

fn leading_capital(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
