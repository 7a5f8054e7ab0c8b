// src/exec/mod.rs

//! Process execution for tasks declared in project files.
//!
//! - [`shell`] provides [`ShellExecutor`], a structured executor whose
//!   fields (`cmd`, `dir`, `env`, `quiet`, `retries`) are filled by the
//!   configuration layers before every run.

pub mod shell;

pub use shell::ShellExecutor;
