// src/task/executor.rs

//! The behaviour behind a task.
//!
//! [`Executor`] has two shapes:
//! - [`Executor::Func`]: a bare fallible callback. It has no fields, so
//!   configuration binding does nothing for it.
//! - [`Executor::Structured`]: a value implementing [`StructuredExecutor`],
//!   whose fields (declared through [`Bindable`]) are overwritten by the
//!   configuration layers before every run.

use std::fmt;

use anyhow::{Result, bail};

use crate::config::{Bindable, Config, bind};

/// Callback type wrapped by [`FnExecutor`].
pub type TaskFn = Box<dyn FnMut() -> Result<()> + Send>;

/// User-defined executor with configurable fields.
pub trait StructuredExecutor: Bindable + Send {
    /// Check the bound fields before anything runs.
    fn validate(&self) -> Result<()>;

    fn execute(&mut self) -> Result<()>;
}

/// Wraps a zero-argument callback.
pub struct FnExecutor {
    runner: Option<TaskFn>,
}

impl FnExecutor {
    pub fn new<F>(runner: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        Self {
            runner: Some(Box::new(runner)),
        }
    }

    /// An executor without a callback; it never validates.
    pub fn empty() -> Self {
        Self { runner: None }
    }

    pub fn validate(&self) -> Result<()> {
        if self.runner.is_none() {
            bail!("executor has no callback");
        }
        Ok(())
    }

    pub fn execute(&mut self) -> Result<()> {
        match self.runner.as_mut() {
            Some(runner) => runner(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor")
            .field("has_runner", &self.runner.is_some())
            .finish()
    }
}

pub enum Executor {
    Func(FnExecutor),
    Structured(Box<dyn StructuredExecutor>),
}

impl Executor {
    pub fn func<F>(runner: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        Executor::Func(FnExecutor::new(runner))
    }

    pub fn structured<E>(executor: E) -> Self
    where
        E: StructuredExecutor + 'static,
    {
        Executor::Structured(Box::new(executor))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Executor::Func(_) => "func",
            Executor::Structured(_) => "structured",
        }
    }

    /// Apply one configuration layer. Always `0` for function executors.
    pub fn bind_layer(&mut self, config: &Config) -> usize {
        match self {
            Executor::Func(_) => 0,
            Executor::Structured(inner) => bind(config, inner.as_mut()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Executor::Func(inner) => inner.validate(),
            Executor::Structured(inner) => inner.validate(),
        }
    }

    pub fn execute(&mut self) -> Result<()> {
        match self {
            Executor::Func(inner) => inner.execute(),
            Executor::Structured(inner) => inner.execute(),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Executor").field(&self.kind()).finish()
    }
}

impl From<FnExecutor> for Executor {
    fn from(inner: FnExecutor) -> Self {
        Executor::Func(inner)
    }
}
