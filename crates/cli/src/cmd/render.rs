//! Implementation of the `cdk-handler render` command.
//!
//! Validates the handler arguments, builds the stack with the builder for its
//! deployment type, and writes the template to stdout as YAML.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use cdk_handler_lib::environment::ConnectionSettings;
use cdk_handler_lib::handler::Handler;

use super::{handler_name, load_args};

pub struct RenderOptions {
  pub config: PathBuf,
  pub project_path: PathBuf,
  pub user_data: Option<PathBuf>,
  pub region: Option<String>,
  pub name: Option<String>,
}

fn load_user_data(path: Option<&PathBuf>) -> Result<Value> {
  let Some(path) = path else {
    return Ok(Value::Null);
  };
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read user data: {}", path.display()))?;
  serde_yaml::from_str(&content).with_context(|| format!("Failed to parse user data: {}", path.display()))
}

pub fn cmd_render(options: &RenderOptions) -> Result<()> {
  let args = load_args(&options.config)?;
  let user_data = load_user_data(options.user_data.as_ref())?;
  let name = options.name.clone().unwrap_or_else(|| handler_name(&options.config));

  let handler = Handler::new(name, args, &options.project_path)
    .with_user_data(user_data)
    .with_connection(ConnectionSettings::new(options.region.clone()));

  let template = handler
    .render()
    .with_context(|| format!("Failed to render {}", handler.template_path().display()))?;
  info!(handler = handler.name(), "template rendered");

  print!("{}", template);
  Ok(())
}
