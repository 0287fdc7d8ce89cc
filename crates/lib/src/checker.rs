//! Availability checks for the external tools the builders shell out to.

use std::rc::Rc;

use tracing::debug;

use crate::process::{ToolCommand, ToolRunner};

/// Probes for executables on `PATH` and installed Node packages.
///
/// Probes never fail: anything that prevents a positive answer is reported as
/// `false`.
#[cfg_attr(test, mockall::automock)]
pub trait Prerequisites {
  fn command_exists(&self, name: &str) -> bool;
  fn package_exists(&self, name: &str) -> bool;
}

/// [`Prerequisites`] backed by `which` and `npm list`.
pub struct CommandChecker {
  runner: Rc<dyn ToolRunner>,
}

impl CommandChecker {
  pub fn new(runner: Rc<dyn ToolRunner>) -> Self {
    Self { runner }
  }
}

impl Prerequisites for CommandChecker {
  fn command_exists(&self, name: &str) -> bool {
    let found = which::which(name);
    debug!(command = name, path = ?found.as_ref().ok(), "probed command");
    found.is_ok()
  }

  /// Local install first, then global.
  fn package_exists(&self, name: &str) -> bool {
    let local = ToolCommand::new("npm").args(["list", name]).quiet();
    if self.runner.run(&local).is_ok() {
      debug!(package = name, scope = "local", "found node package");
      return true;
    }

    let global = ToolCommand::new("npm").args(["--global", "list", name]).quiet();
    let found = self.runner.run(&global).is_ok();
    debug!(package = name, scope = "global", found, "probed node package");
    found
  }
}
