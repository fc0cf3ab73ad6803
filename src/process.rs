//! External command runner for test fixtures.
//!
//! Fixtures that drive a real client (restore, push, pack) need to run it and
//! capture what it printed. The mock server itself never runs commands.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{MockServerError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A command to run: program, arguments, working directory and environment overrides.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Override an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Exit code and captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or -1 if the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr.
    pub fn all_output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Run `spec` to completion and capture its output.
///
/// # Errors
///
/// Returns an error if the program cannot be started or does not exit before
/// the timeout. A timed-out child is killed.
#[tracing::instrument(skip(spec), fields(program = %spec.program))]
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }

    tracing::debug!(args = ?spec.args, "running command");
    let child = command.spawn().map_err(|source| MockServerError::CommandSpawn {
        program: spec.program.clone(),
        source,
    })?;

    let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|source| MockServerError::CommandSpawn {
            program: spec.program.clone(),
            source,
        })?,
        Err(_) => {
            tracing::warn!(timeout = ?spec.timeout, "command timed out");
            return Err(MockServerError::CommandTimedOut {
                program: spec.program.clone(),
                timeout: spec.timeout,
            });
        }
    };

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    tracing::debug!(exit_code = result.exit_code, "command finished");
    Ok(result)
}
