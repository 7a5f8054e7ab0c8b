// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{Config, default_project_path};

/// Command-line arguments for `bud`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bud",
    version,
    about = "Run dependency-ordered, configurable build tasks; re-run them when files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = default_project_path())]
    pub file: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run tasks (and their dependencies), in order.
    Run {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,

        /// Override a field of the requested task: `--set key=value`.
        /// Values are parsed as TOML, falling back to a plain string.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
        overrides: Vec<(String, String)>,
    },
    /// List registered tasks.
    List,
    /// Report unknown dependencies and cycles without running anything.
    Check,
    /// Start every `[[watch]]` and block until Ctrl-C.
    Watch,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Fold `--set` pairs into an override layer.
pub fn overrides_config(pairs: &[(String, String)]) -> Option<Config> {
    if pairs.is_empty() {
        return None;
    }
    let mut config = Config::new();
    for (key, value) in pairs {
        config.set(key, Config::parse_value(value));
    }
    Some(config)
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_with_overrides() {
        let args = CliArgs::try_parse_from([
            "bud", "--file", "x.toml", "run", "build", "test", "--set", "num=6", "--set",
            "name=bud",
        ])
        .unwrap();
        assert_eq!(args.file, PathBuf::from("x.toml"));

        let Command::Run { tasks, overrides } = args.command else {
            panic!("expected run");
        };
        assert_eq!(tasks, ["build", "test"]);

        let cfg = overrides_config(&overrides).unwrap();
        assert_eq!(cfg.int("num"), Some(6));
        assert_eq!(cfg.string("name"), Some("bud"));
    }

    #[test]
    fn global_flags_after_subcommand_and_bad_set() {
        let args = CliArgs::try_parse_from(["bud", "list", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(args.file, PathBuf::from("Bud.toml"));

        assert!(CliArgs::try_parse_from(["bud", "run", "t", "--set", "novalue"]).is_err());
        assert!(CliArgs::try_parse_from(["bud", "run"]).is_err());
    }
}
