//! Handler arguments.
//!
//! Arguments arrive as a YAML mapping. Parsing enforces the schema (known keys,
//! required keys, enum values); [`HandlerArgs::validate`] enforces the rules that
//! span several keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::synth::Context;

pub const DEFAULT_CLASS_NAME: &str = "CdkStack";
pub const CDK_JSON_FILE_NAME: &str = "cdk.json";

/// Options understood by the bootstrapless synthesizer.
pub const BOOTSTRAPLESS_OPTIONS: [&str; 10] = [
  "file_asset_bucket_name",
  "file_asset_prefix",
  "file_asset_publishing_role_arn",
  "file_asset_region_set",
  "image_asset_account_id",
  "image_asset_publishing_role_arn",
  "image_asset_region_set",
  "image_asset_repository_name",
  "image_asset_tag_prefix",
  "template_bucket_name",
];

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid handler arguments: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("invalid handler arguments: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
  Bootstrapped,
  Bootstrapless,
  CdkJson,
}

impl DeploymentType {
  pub fn as_str(&self) -> &'static str {
    match self {
      DeploymentType::Bootstrapped => "bootstrapped",
      DeploymentType::Bootstrapless => "bootstrapless",
      DeploymentType::CdkJson => "cdk_json",
    }
  }
}

impl std::fmt::Display for DeploymentType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerArgs {
  /// Stack definition file or `cdk.json`, relative to the project's `templates` directory.
  pub path: String,
  pub deployment_type: DeploymentType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bootstrap_qualifier: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<Context>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub class_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_logical_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bootstrapless_config: Option<BTreeMap<String, String>>,
}

impl HandlerArgs {
  pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
  }

  pub fn class_name(&self) -> &str {
    self.class_name.as_deref().unwrap_or(DEFAULT_CLASS_NAME)
  }

  pub fn bootstrapless_options(&self) -> BTreeMap<String, String> {
    self.bootstrapless_config.clone().unwrap_or_default()
  }

  /// Whether `path` names an external CDK project file.
  pub fn targets_cdk_json(&self) -> bool {
    Path::new(&normalise_path(&self.path))
      .file_name()
      .is_some_and(|name| name == CDK_JSON_FILE_NAME)
  }

  /// Check the rules that involve more than one key.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if let Some(options) = &self.bootstrapless_config
      && let Some(unknown) = options.keys().find(|key| !BOOTSTRAPLESS_OPTIONS.contains(&key.as_str()))
    {
      return Err(ConfigError::Invalid(format!(
        "unknown bootstrapless_config option '{}'",
        unknown
      )));
    }

    match self.deployment_type {
      DeploymentType::Bootstrapped => {
        if self.bootstrapless_config.is_some() {
          return Err(ConfigError::Invalid(
            "bootstrapless_config cannot be used with the bootstrapped deployment_type".to_string(),
          ));
        }
      }
      DeploymentType::Bootstrapless => {
        if self.bootstrap_qualifier.is_some() {
          return Err(ConfigError::Invalid(
            "bootstrap_qualifier cannot be used with the bootstrapless deployment_type".to_string(),
          ));
        }
      }
      DeploymentType::CdkJson => {
        if !self.targets_cdk_json() {
          return Err(ConfigError::Invalid(format!(
            "the cdk_json deployment_type requires path to name a {} file, got '{}'",
            CDK_JSON_FILE_NAME, self.path
          )));
        }
        if self.stack_logical_id.is_none() {
          return Err(ConfigError::Invalid(
            "stack_logical_id is required for the cdk_json deployment_type".to_string(),
          ));
        }
        if let Some(context) = &self.context
          && let Some((key, _)) = context.iter().find(|(_, value)| value.is_array() || value.is_object())
        {
          return Err(ConfigError::Invalid(format!(
            "context value for '{}' must be a scalar for the cdk_json deployment_type",
            key
          )));
        }
      }
    }

    if self.deployment_type != DeploymentType::CdkJson && self.targets_cdk_json() {
      return Err(ConfigError::Invalid(format!(
        "path '{}' names a {} file; use the cdk_json deployment_type",
        self.path, CDK_JSON_FILE_NAME
      )));
    }

    Ok(())
  }
}

/// Normalize Windows-style separators so configs are portable.
fn normalise_path(path: &str) -> String {
  path.replace('\\', "/")
}

/// Resolve a template path against `<project_path>/templates`.
///
/// Absolute paths are returned unchanged.
pub fn resolve_template_path(project_path: &Path, path: &str) -> PathBuf {
  project_path.join("templates").join(normalise_path(path))
}
