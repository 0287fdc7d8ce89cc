//! In-process stack synthesis.
//!
//! A small construct model: an [`App`] owns stacks, each stack collects
//! CloudFormation sections and assets, and [`App::synth`] writes a cloud
//! assembly directory in the layout the CDK CLI produces:
//!
//! - `manifest.json` - the assembly manifest listing artifacts
//! - `<stack>.template.json` - the synthesized template
//! - `<stack>.assets.json` - the asset manifest consumed by `cdk-assets`
//!
//! # Submodules
//!
//! - [`app`] - the synthesis root and stack handles
//! - [`assembly`] - cloud assembly and asset manifest model (read and write)
//! - [`asset`] - content fingerprints for asset sources
//! - [`synthesizer`] - stack synthesizers deciding where assets are published

pub mod app;
pub mod assembly;
pub mod asset;
pub mod synthesizer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

pub use app::{App, FileAssetLocation, ImageAssetLocation, StackHandle};
pub use assembly::{Artifact, AssetManifest, CloudAssembly};
pub use synthesizer::{BootstraplessSynthesizer, QUALIFIER_CONTEXT_KEY, StackSynthesizer};

/// Deployment context handed to synthesis (feature flags, qualifier, user keys).
pub type Context = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum SynthError {
  #[error("invalid stack id '{0}': use letters, digits and '-' and start with a letter")]
  InvalidStackId(String),

  #[error("there is already a stack named '{0}' in this app")]
  DuplicateStack(String),

  #[error("stack '{stack}' already defines {section} '{id}'")]
  DuplicateConstruct {
    stack: String,
    section: &'static str,
    id: String,
  },

  #[error("stack construction failed: {0}")]
  Construct(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("unknown bootstrapless synthesizer option '{0}'")]
  UnknownOption(String),

  #[error("{0}")]
  Configuration(String),

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON in {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("stack '{0}' not found in cloud assembly")]
  StackNotFound(String),
}

/// Registers one named stack on an [`App`].
///
/// `synthesizer` is `None` when the app's default synthesizer should be used.
pub trait StackConstructor {
  fn construct(
    &self,
    app: &App,
    id: &str,
    user_data: &Value,
    synthesizer: Option<&StackSynthesizer>,
  ) -> Result<(), SynthError>;
}

impl<F> StackConstructor for F
where
  F: Fn(&App, &str, &Value, Option<&StackSynthesizer>) -> Result<(), SynthError>,
{
  fn construct(
    &self,
    app: &App,
    id: &str,
    user_data: &Value,
    synthesizer: Option<&StackSynthesizer>,
  ) -> Result<(), SynthError> {
    self(app, id, user_data, synthesizer)
  }
}
