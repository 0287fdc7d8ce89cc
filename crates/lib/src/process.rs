//! External tool invocation.
//!
//! Every subprocess the handler starts (`npx cdk`, `npx cdk-assets`, `npm`) goes
//! through a [`ToolRunner`]. Commands are argument vectors rather than shell
//! strings, so context values and paths are never interpreted by a shell.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Errors raised when an external tool cannot be run to completion.
#[derive(Debug, Error)]
pub enum InvocationError {
  /// The tool ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {command}")]
  Failed { command: String, code: Option<i32> },

  /// The tool could not be started (missing binary, bad working directory).
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },
}

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  pub program: String,
  pub args: Vec<String>,
  /// Complete environment for the child. `None` inherits the current process environment.
  pub env: Option<BTreeMap<String, String>>,
  pub cwd: Option<PathBuf>,
  /// Discard the child's stdout and stderr.
  pub quiet: bool,
}

impl ToolCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: None,
      cwd: None,
      quiet: false,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = Some(env);
    self
  }

  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn quiet(mut self) -> Self {
    self.quiet = true;
    self
  }
}

impl fmt::Display for ToolCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// Runs external commands synchronously, requiring a zero exit status.
#[cfg_attr(test, mockall::automock)]
pub trait ToolRunner {
  fn run(&self, command: &ToolCommand) -> Result<(), InvocationError>;
}

/// [`ToolRunner`] backed by `std::process::Command`.
///
/// The child's stdout is forwarded to our stderr: stdout belongs to the rendered
/// template, so tool chatter must not end up there.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
  fn run(&self, command: &ToolCommand) -> Result<(), InvocationError> {
    let mut process = Command::new(&command.program);
    process.args(&command.args);

    if let Some(env) = &command.env {
      process.env_clear().envs(env);
    }
    if let Some(cwd) = &command.cwd {
      process.current_dir(cwd);
    }
    if command.quiet {
      process.stdout(Stdio::null()).stderr(Stdio::null());
    } else {
      process.stdout(Stdio::from(io::stderr()));
    }

    debug!(command = %command, cwd = ?command.cwd, "spawning process");

    let status = process.status().map_err(|source| InvocationError::Spawn {
      program: command.program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(InvocationError::Failed {
        command: command.to_string(),
        code: status.code(),
      });
    }

    Ok(())
  }
}
