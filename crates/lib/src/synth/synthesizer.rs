//! Stack synthesizers.
//!
//! A synthesizer decides where a stack's assets (including its own template)
//! are published and what bootstrap checks the template carries.
//!
//! - [`StackSynthesizer::Default`] targets the resources created by
//!   `cdk bootstrap`, named after a qualifier.
//! - [`StackSynthesizer::Bootstrapless`] targets explicitly configured buckets,
//!   repositories and roles, so no bootstrap stack is required.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::assembly::{FileDestination, ImageDestination};
use super::{Context, SynthError};

/// Context key holding the bootstrap qualifier.
pub const QUALIFIER_CONTEXT_KEY: &str = "@aws-cdk/core:bootstrapQualifier";
pub const DEFAULT_QUALIFIER: &str = "hnb659fds";
pub const BOOTSTRAP_VERSION_PARAMETER: &str = "BootstrapVersion";
pub const CHECK_BOOTSTRAP_VERSION_RULE: &str = "CheckBootstrapVersion";

/// Destination id used when an asset goes to the deploying account and region.
pub const CURRENT_ENVIRONMENT: &str = "current_account-current_region";

const MIN_BOOTSTRAP_VERSION: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackSynthesizer {
  Default { qualifier: String },
  Bootstrapless(BootstraplessSynthesizer),
}

/// Settings for publishing without a bootstrap stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstraplessSynthesizer {
  pub file_asset_bucket_name: Option<String>,
  pub file_asset_prefix: Option<String>,
  pub file_asset_publishing_role_arn: Option<String>,
  pub file_asset_region_set: Option<String>,
  pub image_asset_account_id: Option<String>,
  pub image_asset_publishing_role_arn: Option<String>,
  pub image_asset_region_set: Option<String>,
  pub image_asset_repository_name: Option<String>,
  pub image_asset_tag_prefix: Option<String>,
  pub template_bucket_name: Option<String>,
}

impl BootstraplessSynthesizer {
  /// Build from snake_case option names, rejecting anything unrecognised.
  pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, SynthError> {
    let mut synthesizer = Self::default();
    for (key, value) in options {
      let slot = match key.as_str() {
        "file_asset_bucket_name" => &mut synthesizer.file_asset_bucket_name,
        "file_asset_prefix" => &mut synthesizer.file_asset_prefix,
        "file_asset_publishing_role_arn" => &mut synthesizer.file_asset_publishing_role_arn,
        "file_asset_region_set" => &mut synthesizer.file_asset_region_set,
        "image_asset_account_id" => &mut synthesizer.image_asset_account_id,
        "image_asset_publishing_role_arn" => &mut synthesizer.image_asset_publishing_role_arn,
        "image_asset_region_set" => &mut synthesizer.image_asset_region_set,
        "image_asset_repository_name" => &mut synthesizer.image_asset_repository_name,
        "image_asset_tag_prefix" => &mut synthesizer.image_asset_tag_prefix,
        "template_bucket_name" => &mut synthesizer.template_bucket_name,
        unknown => return Err(SynthError::UnknownOption(unknown.to_string())),
      };
      *slot = Some(value.clone());
    }
    Ok(synthesizer)
  }

  fn file_destinations(&self, bucket_name: &str, object_key: &str) -> BTreeMap<String, FileDestination> {
    destinations(self.file_asset_region_set.as_deref(), |region| FileDestination {
      bucket_name: bucket_name.to_string(),
      object_key: object_key.to_string(),
      region,
      assume_role_arn: self.file_asset_publishing_role_arn.clone(),
    })
  }
}

/// Comma separated region list; empty entries are dropped.
fn region_set(value: Option<&str>) -> Vec<String> {
  value
    .map(|set| {
      set
        .split(',')
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .collect()
    })
    .unwrap_or_default()
}

/// One destination per configured region, or a single current-environment one.
fn destinations<T>(regions: Option<&str>, make: impl Fn(Option<String>) -> T) -> BTreeMap<String, T> {
  let regions = region_set(regions);
  if regions.is_empty() {
    return BTreeMap::from([(CURRENT_ENVIRONMENT.to_string(), make(None))]);
  }
  regions
    .into_iter()
    .map(|region| (region.clone(), make(Some(region))))
    .collect()
}

/// Where a file asset ends up.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePlacement {
  pub bucket_name: String,
  pub object_key: String,
  pub destinations: BTreeMap<String, FileDestination>,
}

/// Where an image asset ends up.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
  pub repository_name: String,
  pub image_tag: String,
  pub image_uri: String,
  pub destinations: BTreeMap<String, ImageDestination>,
}

impl StackSynthesizer {
  /// Default synthesizer using the qualifier from `context`, if any.
  pub fn from_context(context: &Context) -> Self {
    let qualifier = context
      .get(QUALIFIER_CONTEXT_KEY)
      .and_then(Value::as_str)
      .unwrap_or(DEFAULT_QUALIFIER);
    StackSynthesizer::Default {
      qualifier: qualifier.to_string(),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      StackSynthesizer::Default { .. } => "default",
      StackSynthesizer::Bootstrapless(_) => "bootstrapless",
    }
  }

  /// Placement of a file asset. `extension` includes the leading dot.
  pub fn place_file(&self, hash: &str, extension: &str) -> Result<FilePlacement, SynthError> {
    match self {
      StackSynthesizer::Default { qualifier } => {
        let bucket_name = format!("cdk-{}-assets-${{AWS::AccountId}}-${{AWS::Region}}", qualifier);
        let object_key = format!("{}{}", hash, extension);
        let destination = FileDestination {
          bucket_name: bucket_name.clone(),
          object_key: object_key.clone(),
          region: None,
          assume_role_arn: Some(bootstrap_role(qualifier, "file-publishing-role")),
        };
        Ok(FilePlacement {
          bucket_name,
          object_key,
          destinations: BTreeMap::from([(CURRENT_ENVIRONMENT.to_string(), destination)]),
        })
      }
      StackSynthesizer::Bootstrapless(config) => {
        let bucket_name = config.file_asset_bucket_name.clone().ok_or_else(|| {
          SynthError::Configuration("file_asset_bucket_name is required to publish file assets".to_string())
        })?;
        let object_key = format!(
          "{}{}{}",
          config.file_asset_prefix.as_deref().unwrap_or(""),
          hash,
          extension
        );
        let destinations = config.file_destinations(&bucket_name, &object_key);
        Ok(FilePlacement {
          bucket_name,
          object_key,
          destinations,
        })
      }
    }
  }

  /// Destinations for the stack template itself.
  ///
  /// A bootstrapless synthesizer without any bucket leaves the template
  /// unpublished; the handler hands the template body to the orchestrator anyway.
  pub fn template_destinations(&self, hash: &str) -> Result<BTreeMap<String, FileDestination>, SynthError> {
    match self {
      StackSynthesizer::Default { .. } => Ok(self.place_file(hash, ".json")?.destinations),
      StackSynthesizer::Bootstrapless(config) => {
        let bucket = config
          .template_bucket_name
          .as_deref()
          .or(config.file_asset_bucket_name.as_deref());
        Ok(match bucket {
          Some(bucket) => {
            let object_key = format!("{}{}.json", config.file_asset_prefix.as_deref().unwrap_or(""), hash);
            config.file_destinations(bucket, &object_key)
          }
          None => BTreeMap::new(),
        })
      }
    }
  }

  pub fn place_image(&self, hash: &str) -> Result<ImagePlacement, SynthError> {
    let (repository_name, image_tag, account, role, regions) = match self {
      StackSynthesizer::Default { qualifier } => (
        format!("cdk-{}-container-assets-${{AWS::AccountId}}-${{AWS::Region}}", qualifier),
        hash.to_string(),
        "${AWS::AccountId}".to_string(),
        Some(bootstrap_role(qualifier, "image-publishing-role")),
        None,
      ),
      StackSynthesizer::Bootstrapless(config) => (
        config.image_asset_repository_name.clone().ok_or_else(|| {
          SynthError::Configuration("image_asset_repository_name is required to publish image assets".to_string())
        })?,
        format!("{}{}", config.image_asset_tag_prefix.as_deref().unwrap_or(""), hash),
        config
          .image_asset_account_id
          .clone()
          .unwrap_or_else(|| "${AWS::AccountId}".to_string()),
        config.image_asset_publishing_role_arn.clone(),
        config.image_asset_region_set.as_deref(),
      ),
    };

    let image_uri = format!(
      "{}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}:{}",
      account, repository_name, image_tag
    );
    let destinations = destinations(regions, |region| ImageDestination {
      repository_name: repository_name.clone(),
      image_tag: image_tag.clone(),
      region,
      assume_role_arn: role.clone(),
    });

    Ok(ImagePlacement {
      repository_name,
      image_tag,
      image_uri,
      destinations,
    })
  }

  /// Add the bootstrap version parameter and rule to a template.
  ///
  /// Only the default synthesizer depends on a bootstrap stack.
  pub fn add_bootstrap_checks(
    &self,
    parameters: &mut serde_json::Map<String, Value>,
    rules: &mut serde_json::Map<String, Value>,
  ) {
    let StackSynthesizer::Default { qualifier } = self else {
      return;
    };

    parameters.insert(
      BOOTSTRAP_VERSION_PARAMETER.to_string(),
      json!({
        "Type": "AWS::SSM::Parameter::Value<String>",
        "Default": format!("/cdk-bootstrap/{}/version", qualifier),
        "Description": "Version of the CDK Bootstrap resources in this environment, automatically retrieved from SSM Parameter Store. [cdk:skip]"
      }),
    );

    let unsupported: Vec<String> = (1..MIN_BOOTSTRAP_VERSION).map(|v| v.to_string()).collect();
    rules.insert(
      CHECK_BOOTSTRAP_VERSION_RULE.to_string(),
      json!({
        "Assertions": [{
          "Assert": {
            "Fn::Not": [{ "Fn::Contains": [unsupported, { "Ref": BOOTSTRAP_VERSION_PARAMETER }] }]
          },
          "AssertDescription": format!(
            "CDK bootstrap stack version {} required. Please run 'cdk bootstrap' with a recent version of the CDK CLI.",
            MIN_BOOTSTRAP_VERSION
          )
        }]
      }),
    );
  }
}

fn bootstrap_role(qualifier: &str, role: &str) -> String {
  format!(
    "arn:${{AWS::Partition}}:iam::${{AWS::AccountId}}:role/cdk-{}-{}-${{AWS::AccountId}}-${{AWS::Region}}",
    qualifier, role
  )
}
