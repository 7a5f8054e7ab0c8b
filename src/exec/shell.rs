// src/exec/shell.rs

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::{Bindable, FieldMap};
use crate::task::StructuredExecutor;

/// Runs `cmd` through the platform shell.
///
/// With `quiet`, the command's output is captured and logged at debug
/// level instead of going to the terminal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellExecutor {
    pub cmd: String,
    /// Working directory; empty means the current one.
    pub dir: String,
    /// `KEY=VALUE` entries added to the environment.
    pub env: Vec<String>,
    pub quiet: bool,
    /// Extra attempts after a failed one.
    pub retries: i64,
}

impl ShellExecutor {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }

    fn command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        if !self.dir.is_empty() {
            cmd.current_dir(Path::new(&self.dir));
        }
        for (key, value) in self.env.iter().filter_map(|e| e.split_once('=')) {
            cmd.env(key, value);
        }
        if self.quiet {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        cmd
    }

    fn run_once(&self) -> Result<()> {
        let mut child = self
            .command()
            .spawn()
            .with_context(|| format!("spawning `{}`", self.cmd))?;

        // Drain both pipes so a chatty child cannot block on a full buffer.
        let readers: Vec<_> = [
            child.stdout.take().map(|s| Box::new(s) as Box<dyn std::io::Read + Send>),
            child.stderr.take().map(|s| Box::new(s) as Box<dyn std::io::Read + Send>),
        ]
        .into_iter()
        .flatten()
        .map(|stream| {
            thread::spawn(move || {
                for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
                    debug!("output: {}", line);
                }
            })
        })
        .collect();

        let status = child
            .wait()
            .with_context(|| format!("waiting for `{}`", self.cmd))?;
        for reader in readers {
            let _ = reader.join();
        }

        if !status.success() {
            match status.code() {
                Some(code) => bail!("`{}` exited with status {code}", self.cmd),
                None => bail!("`{}` was terminated by a signal", self.cmd),
            }
        }
        Ok(())
    }
}

impl Bindable for ShellExecutor {
    fn fields(&mut self) -> FieldMap<'_> {
        FieldMap::new()
            .string("cmd", &mut self.cmd)
            .string("dir", &mut self.dir)
            .strings("env", &mut self.env)
            .bool("quiet", &mut self.quiet)
            .int("retries", &mut self.retries)
    }
}

impl StructuredExecutor for ShellExecutor {
    fn validate(&self) -> Result<()> {
        if self.cmd.trim().is_empty() {
            bail!("cmd is empty");
        }
        if let Some(bad) = self.env.iter().find(|e| !e.contains('=') || e.starts_with('=')) {
            bail!("env entry '{bad}' is not KEY=VALUE");
        }
        if self.retries < 0 {
            bail!("retries must be >= 0 (got {})", self.retries);
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let attempts = self.retries + 1;
        let mut attempt = 1;
        loop {
            info!(cmd = %self.cmd, attempt, "running command");
            match self.run_once() {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(cmd = %self.cmd, attempt, "command failed, retrying: {err:#}");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, bind};

    #[test]
    fn validation_rejects_empty_cmd_and_bad_env() {
        assert!(ShellExecutor::default().validate().is_err());

        let mut exec = ShellExecutor::new("true");
        exec.validate().unwrap();

        exec.env = vec!["NOEQUALS".into()];
        assert!(exec.validate().is_err());

        exec.env = vec!["A=1".into()];
        exec.retries = -1;
        assert!(exec.validate().is_err());
    }

    #[test]
    fn fields_bind_from_config() {
        let mut exec = ShellExecutor::new("echo hi");
        let cfg = Config::from_toml_str(
            r#"
            dir = "/tmp"
            env = ["A=1", "B=2"]
            quiet = true
            retries = 2
            "#,
        )
        .unwrap();
        assert_eq!(bind(&cfg, &mut exec), 4);
        assert_eq!(exec.cmd, "echo hi");
        assert_eq!(exec.env, ["A=1", "B=2"]);
        assert!(exec.quiet);
        assert_eq!(exec.retries, 2);
    }

    #[cfg(unix)]
    #[test]
    fn runs_commands_and_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let mut exec = ShellExecutor {
            cmd: "printf \"$GREETING\" > marker".into(),
            dir: dir.path().to_string_lossy().into_owned(),
            env: vec!["GREETING=hello".into()],
            quiet: true,
            retries: 0,
        };
        exec.execute().unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "hello");

        let mut failing = ShellExecutor {
            cmd: "exit 3".into(),
            quiet: true,
            ..Default::default()
        };
        let err = failing.execute().unwrap_err();
        assert!(err.to_string().contains("status 3"));
    }

    #[cfg(unix)]
    #[test]
    fn retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        // Fails on the first attempt, succeeds on the second.
        let mut exec = ShellExecutor {
            cmd: "if [ -f seen ]; then exit 0; else touch seen; exit 1; fi".into(),
            dir: dir.path().to_string_lossy().into_owned(),
            quiet: true,
            retries: 1,
            ..Default::default()
        };
        exec.execute().unwrap();
    }
}
