// src/errors.rs

//! Crate-wide error types.
//!
//! Two classes are kept apart on purpose:
//! - [`RegistrationError`]: a programming mistake in the code that declares
//!   tasks and watches. Hosts are expected to abort the process
//!   ([`exit_on_registration_error`]).
//! - [`BudError`]: everything that can go wrong while a task graph runs.
//!   These are returned to the caller and never terminate the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudError {
    #[error("task name is empty")]
    EmptyTaskName,

    #[error("could not find task: {0}")]
    TaskNotFound(String),

    #[error("recursion detected: task '{task}' is already running. Call sequence: [{}]", .sequence.join(" -> "))]
    Recursion { task: String, sequence: Vec<String> },

    #[error("task '{task}' failed validation: {source:#}")]
    Validation {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}' failed: {source:#}")]
    Execution {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("file watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fatal mistakes made while declaring tasks or watches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("task name is empty")]
    EmptyName,

    #[error("task '{task}' must have dependencies or an executor")]
    NoWork { task: String },

    #[error("task name exists: {task}")]
    Duplicate { task: String },

    #[error("watch must have at least one pattern")]
    EmptyPatterns,

    #[error("invalid watch pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("watch must have related tasks or a callback")]
    WatchWithoutTarget,
}

/// Print a registration failure to stderr and terminate with status 1.
///
/// Registration happens once at startup, so there is nothing sensible to
/// recover to.
pub fn exit_on_registration_error<T>(result: std::result::Result<T, RegistrationError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("bud: {err}");
            std::process::exit(1);
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BudError>;
