use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use bud::config::{Bindable, FieldMap};
use bud::task::StructuredExecutor;

/// One lifecycle call seen by a [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Validated(String),
    Started { task: String, num: i64, a: String },
    Finished(String),
}

/// Shared, ordered log of [`Step`]s across executors.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, step: Step) {
        self.steps.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    /// Labels of executors whose `execute` was entered, in order.
    pub fn started(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Started { task, .. } => Some(task),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Finished(task) => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Position of the first step matching `pred`.
    pub fn position(&self, pred: impl Fn(&Step) -> bool) -> Option<usize> {
        self.steps().iter().position(pred)
    }

    pub fn clear(&self) {
        self.steps.lock().unwrap().clear();
    }
}

/// Structured executor that records every lifecycle call.
///
/// Bindable fields: `num`, `a`, `fail` (`"validate"` or `"execute"`),
/// `sleep_ms`, `panic`.
#[derive(Debug, Clone)]
pub struct RecordingExecutor {
    pub label: String,
    pub num: i64,
    pub a: String,
    pub fail: String,
    pub sleep_ms: i64,
    pub panic: bool,
    journal: Journal,
}

impl RecordingExecutor {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Self {
        Self {
            label: label.into(),
            num: 0,
            a: String::new(),
            fail: String::new(),
            sleep_ms: 0,
            panic: false,
            journal: journal.clone(),
        }
    }

    pub fn sleeping(mut self, ms: i64) -> Self {
        self.sleep_ms = ms;
        self
    }

    pub fn failing(mut self, phase: &str) -> Self {
        self.fail = phase.to_string();
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }
}

impl Bindable for RecordingExecutor {
    fn fields(&mut self) -> FieldMap<'_> {
        FieldMap::new()
            .int("num", &mut self.num)
            .string("a", &mut self.a)
            .string("fail", &mut self.fail)
            .int("sleep_ms", &mut self.sleep_ms)
            .bool("panic", &mut self.panic)
    }
}

impl StructuredExecutor for RecordingExecutor {
    fn validate(&self) -> Result<()> {
        self.journal.record(Step::Validated(self.label.clone()));
        if self.fail == "validate" {
            bail!("{} refused to validate", self.label);
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        self.journal.record(Step::Started {
            task: self.label.clone(),
            num: self.num,
            a: self.a.clone(),
        });
        if self.panic {
            panic!("{} blew up", self.label);
        }
        if self.sleep_ms > 0 {
            thread::sleep(Duration::from_millis(self.sleep_ms as u64));
        }
        if self.fail == "execute" {
            bail!("{} failed", self.label);
        }
        self.journal.record(Step::Finished(self.label.clone()));
        Ok(())
    }
}
