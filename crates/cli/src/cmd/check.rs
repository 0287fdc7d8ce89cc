//! Check command implementation.
//!
//! Probes every command and Node package the handler needs at render time.

use std::rc::Rc;

use anyhow::{Result, bail};
use serde::Serialize;

use cdk_handler_lib::checker::{CommandChecker, Prerequisites};
use cdk_handler_lib::handler::{COMMAND_PREREQUISITES, PACKAGE_PREREQUISITES};
use cdk_handler_lib::process::SystemRunner;

use crate::output::{print_error, print_json, print_success};

#[derive(Debug, Serialize)]
struct PrerequisiteStatus {
  name: &'static str,
  kind: &'static str,
  found: bool,
}

fn probe(prerequisites: &dyn Prerequisites) -> Vec<PrerequisiteStatus> {
  let commands = COMMAND_PREREQUISITES.iter().map(|&name| PrerequisiteStatus {
    name,
    kind: "command",
    found: prerequisites.command_exists(name),
  });
  let packages = PACKAGE_PREREQUISITES.iter().map(|&name| PrerequisiteStatus {
    name,
    kind: "node package",
    found: prerequisites.package_exists(name),
  });
  commands.chain(packages).collect()
}

pub fn cmd_check(json: bool) -> Result<()> {
  let checker = CommandChecker::new(Rc::new(SystemRunner));
  let statuses = probe(&checker);

  if json {
    print_json(&statuses)?;
  } else {
    for status in &statuses {
      if status.found {
        print_success(&format!("{} {}", status.kind, status.name));
      } else {
        print_error(&format!("{} {} not found", status.kind, status.name));
      }
    }
  }

  let missing = statuses.iter().filter(|s| !s.found).count();
  if missing > 0 {
    bail!("{} prerequisite(s) missing", missing);
  }
  Ok(())
}
