use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{BuildError, Toolkit};
use crate::environment::add_bootstrapless_variables;
use crate::process::ToolCommand;
use crate::synth::assembly::read_json;
use crate::synth::{AssetManifest, Context};

/// Builds a stack from an external CDK project with `npx cdk synth`.
///
/// The project may be written in any CDK language; nothing runs in process.
/// Bootstrapless options reach the project as `BSS_*` environment variables.
pub struct CdkJsonBuilder {
  toolkit: Toolkit,
  cdk_json: PathBuf,
  stack_logical_id: String,
  bootstrapless_options: BTreeMap<String, String>,
}

/// Context values are passed on the command line; strings go verbatim.
fn context_argument(key: &str, value: &Value) -> String {
  match value {
    Value::String(s) => format!("{}={}", key, s),
    other => format!("{}={}", key, other),
  }
}

/// `null`, `false`, zero and empty strings, arrays or maps count as no user data.
fn is_empty_user_data(user_data: &Value) -> bool {
  match user_data {
    Value::Null => true,
    Value::Bool(b) => !b,
    Value::Number(n) => n.as_f64() == Some(0.0),
    Value::String(s) => s.is_empty(),
    Value::Array(items) => items.is_empty(),
    Value::Object(map) => map.is_empty(),
  }
}

impl CdkJsonBuilder {
  pub fn new(
    toolkit: Toolkit,
    cdk_json: impl Into<PathBuf>,
    stack_logical_id: impl Into<String>,
    bootstrapless_options: BTreeMap<String, String>,
  ) -> Self {
    Self {
      toolkit,
      cdk_json: cdk_json.into(),
      stack_logical_id: stack_logical_id.into(),
      bootstrapless_options,
    }
  }

  fn project_dir(&self) -> &Path {
    self.cdk_json.parent().unwrap_or(Path::new("."))
  }

  pub fn build_template(&self, context: &Context, user_data: &Value) -> Result<Value, BuildError> {
    if !is_empty_user_data(user_data) {
      warn!(
        "The cdk_json deployment_type does not support user data; it will not be passed to the CDK project. \
         Use context or environment variables instead."
      );
    }

    let mut env = self.toolkit.environment();
    add_bootstrapless_variables(&mut env, &self.bootstrapless_options);

    let outdir = tempfile::Builder::new()
      .prefix("cdk-handler-")
      .tempdir()
      .map_err(BuildError::OutputDir)?;
    let logical_id = self.stack_logical_id.as_str();

    let mut command = ToolCommand::new("npx")
      .args(["cdk", "synth", logical_id, "-o"])
      .arg(outdir.path().to_string_lossy())
      .arg("-q");
    for (key, value) in context {
      command = command.arg("--context").arg(context_argument(key, value));
    }
    let command = command.with_env(env.clone()).with_cwd(self.project_dir());

    info!(stack = logical_id, project = %self.project_dir().display(), "synthesizing CDK project");
    self.toolkit.run_command(&command)?;

    let manifest_file = outdir.path().join(format!("{}.assets.json", logical_id));
    if !manifest_file.is_file() {
      return Err(BuildError::ManifestMissing);
    }
    let manifest = AssetManifest::from_file(&manifest_file)?;
    debug!(
      files = manifest.files.len(),
      images = manifest.docker_images.len(),
      "read asset manifest"
    );

    if super::only_asset_is_template(&manifest, logical_id) {
      debug!(stack = logical_id, "only asset is the stack template, skipping publish");
    } else {
      self.toolkit.publish_assets(&manifest_file, &env)?;
    }

    let template = read_json(&outdir.path().join(format!("{}.template.json", logical_id)))?;
    Ok(template)
  }
}
