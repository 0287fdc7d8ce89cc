use std::path::Path;

use anyhow::Result;

use cdk_handler_lib::handler::Handler;

use super::{handler_name, load_args};
use crate::output::{print_stat, print_success};

/// Run argument validation and the prerequisite checks; nothing is built.
pub fn cmd_validate(config: &Path, project_path: &Path) -> Result<()> {
  let args = load_args(config)?;
  let handler = Handler::new(handler_name(config), args, project_path);

  handler.validate()?;

  print_success(&format!("{} is valid", config.display()));
  print_stat("Deployment type", handler.args().deployment_type.as_str());
  print_stat("Template", &handler.template_path().display().to_string());
  Ok(())
}
