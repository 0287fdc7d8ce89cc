//! Template builders.
//!
//! A builder turns a stack definition into a CloudFormation template, publishing
//! any assets the template depends on along the way. Every variant follows the
//! same sequence:
//!
//! 1. synthesize a cloud assembly into a scoped temporary directory
//! 2. locate the asset manifest (missing is fatal)
//! 3. publish with `cdk-assets`, unless the only asset is the template itself
//! 4. return the stack template
//!
//! Variants differ in how step 1 happens:
//!
//! - [`BootstrappedBuilder`] - in process, assets go to the `cdk bootstrap` resources
//! - [`BootstraplessBuilder`] - in process, assets go to configured buckets and repositories
//! - [`CdkJsonBuilder`] - `npx cdk synth` against an external CDK project

mod bootstrapless;
mod bootstrapped;
mod cdk_json;

use std::path::Path;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DeploymentType;
use crate::environment::{ConnectionSettings, EnvironmentVariables, derive_environment};
use crate::process::{InvocationError, ToolCommand, ToolRunner};
use crate::synth::{App, AssetManifest, Context, StackConstructor, StackSynthesizer, SynthError};

pub use bootstrapless::BootstraplessBuilder;
pub use bootstrapped::BootstrappedBuilder;
pub use cdk_json::CdkJsonBuilder;

/// Id of the single stack synthesized in process.
pub const STACK_LOGICAL_ID: &str = "CDKStack";

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("{0}")]
  ConfigInvalid(String),

  #[error("CDK Asset manifest artifact not found")]
  ManifestMissing,

  #[error("CDK invocation failed: {0}")]
  Invocation(#[from] InvocationError),

  #[error("synthesis failed: {0}")]
  Synth(#[from] SynthError),

  #[error("failed to create synthesis output directory: {0}")]
  OutputDir(#[source] std::io::Error),
}

/// Behaviour shared by all builders: environment derivation and tool invocation.
#[derive(Clone)]
pub struct Toolkit {
  runner: Rc<dyn ToolRunner>,
  connection: ConnectionSettings,
  base_env: EnvironmentVariables,
}

impl Toolkit {
  pub fn new(runner: Rc<dyn ToolRunner>, connection: ConnectionSettings, base_env: EnvironmentVariables) -> Self {
    Self {
      runner,
      connection,
      base_env,
    }
  }

  /// Environment for tool invocations, recomputed on every call.
  pub fn environment(&self) -> EnvironmentVariables {
    derive_environment(&self.base_env, &self.connection)
  }

  pub fn run_command(&self, command: &ToolCommand) -> Result<(), BuildError> {
    Ok(self.runner.run(command)?)
  }

  /// `npx cdk-assets -v publish --path <manifest>`.
  pub fn publish_assets(&self, manifest_file: &Path, env: &EnvironmentVariables) -> Result<(), BuildError> {
    info!(manifest = %manifest_file.display(), "publishing CDK assets");
    let command = ToolCommand::new("npx")
      .args(["cdk-assets", "-v", "publish", "--path"])
      .arg(manifest_file.to_string_lossy())
      .with_env(env.clone());
    self.run_command(&command)
  }

  /// Publish unless the template is the only asset.
  fn publish_if_needed(&self, manifest: &AssetManifest, manifest_file: &Path, logical_id: &str) -> Result<(), BuildError> {
    if only_asset_is_template(manifest, logical_id) {
      debug!(stack = logical_id, "only asset is the stack template, skipping publish");
      return Ok(());
    }
    self.publish_assets(manifest_file, &self.environment())
  }
}

/// True when the manifest holds no images and exactly the stack's own template file.
///
/// The template is handed to the orchestrator directly, so publishing it alone
/// would be wasted work.
pub fn only_asset_is_template(manifest: &AssetManifest, logical_id: &str) -> bool {
  let template_key = format!("{}.template.json", logical_id);
  manifest.docker_images.is_empty() && manifest.files.len() == 1 && manifest.files.contains_key(&template_key)
}

/// Synthesize in process, publish, and extract the template.
fn build_in_process(
  toolkit: &Toolkit,
  constructor: &dyn StackConstructor,
  context: &Context,
  user_data: &Value,
  synthesizer: Option<StackSynthesizer>,
) -> Result<Value, BuildError> {
  let outdir = tempfile::Builder::new()
    .prefix("cdk-handler-")
    .tempdir()
    .map_err(BuildError::OutputDir)?;

  debug!(context = ?context, "cdk context");
  let app = App::new(context.clone(), outdir.path());
  constructor.construct(&app, STACK_LOGICAL_ID, user_data, synthesizer.as_ref())?;

  info!(stack = STACK_LOGICAL_ID, "synthesizing stack");
  let assembly = app.synth()?;

  let manifest = assembly.asset_manifest().ok_or(BuildError::ManifestMissing)?;
  toolkit.publish_if_needed(&manifest.contents, &manifest.file, STACK_LOGICAL_ID)?;

  Ok(assembly.get_stack_by_name(STACK_LOGICAL_ID)?.template.clone())
}

/// One builder per deployment type.
pub enum Builder {
  Bootstrapped(BootstrappedBuilder),
  Bootstrapless(BootstraplessBuilder),
  CdkJson(CdkJsonBuilder),
}

impl Builder {
  pub fn deployment_type(&self) -> DeploymentType {
    match self {
      Builder::Bootstrapped(_) => DeploymentType::Bootstrapped,
      Builder::Bootstrapless(_) => DeploymentType::Bootstrapless,
      Builder::CdkJson(_) => DeploymentType::CdkJson,
    }
  }

  pub fn build_template(&self, context: &Context, user_data: &Value) -> Result<Value, BuildError> {
    info!(deployment_type = %self.deployment_type(), "building template");
    match self {
      Builder::Bootstrapped(builder) => builder.build_template(context, user_data),
      Builder::Bootstrapless(builder) => builder.build_template(context, user_data),
      Builder::CdkJson(builder) => builder.build_template(context, user_data),
    }
  }
}
