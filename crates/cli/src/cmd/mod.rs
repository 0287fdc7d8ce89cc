mod check;
mod render;
mod validate;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use cdk_handler_lib::config::HandlerArgs;

pub use check::cmd_check;
pub use render::{RenderOptions, cmd_render};
pub use validate::cmd_validate;

/// Read and parse a handler arguments file.
fn load_args(config: &Path) -> Result<HandlerArgs> {
  let content =
    fs::read_to_string(config).with_context(|| format!("Failed to read handler arguments: {}", config.display()))?;
  HandlerArgs::from_yaml_str(&content).with_context(|| format!("Failed to parse handler arguments: {}", config.display()))
}

/// Handler name from the arguments file stem.
fn handler_name(config: &Path) -> String {
  config
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "template".to_string())
}
