// src/engine/call_stack.rs

use std::collections::HashSet;
use std::fmt;

use crate::errors::{BudError, Result};
use crate::task::TaskName;

/// Where a top-level run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Resolving,
    Configuring,
    Validating,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Resolving => "resolving",
            RunPhase::Configuring => "configuring",
            RunPhase::Validating => "validating",
            RunPhase::Executing => "executing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tasks currently being walked by one top-level run, outermost first,
/// plus the tasks that run has already completed.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<TaskName>,
    completed: HashSet<TaskName>,
    phase: RunPhase,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `name`. Fails without pushing if it is already on the stack.
    pub fn push(&mut self, name: &str) -> Result<()> {
        if self.frames.iter().any(|f| f == name) {
            let mut sequence = self.frames.clone();
            sequence.push(name.to_string());
            return Err(BudError::Recursion {
                task: name.to_string(),
                sequence,
            });
        }
        self.frames.push(name.to_string());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TaskName> {
        self.frames.pop()
    }

    /// Innermost task.
    pub fn top(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    pub fn frames(&self) -> &[TaskName] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record that `name` finished successfully in this run.
    pub fn complete(&mut self, name: &str) {
        self.completed.insert(name.to_string());
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.completed.contains(name)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    /// Back to `Idle` with no frames and nothing completed.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.completed.clear();
        self.phase = RunPhase::Idle;
    }
}
