//! The template handler.
//!
//! Validates arguments, checks tool prerequisites, picks the builder for the
//! deployment type and renders the resulting template as YAML.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::builder::{
  BootstraplessBuilder, BootstrappedBuilder, BuildError, Builder, CdkJsonBuilder, Toolkit,
};
use crate::checker::{CommandChecker, Prerequisites};
use crate::config::{ConfigError, DeploymentType, HandlerArgs, resolve_template_path};
use crate::environment::{ConnectionSettings, EnvironmentVariables, process_environment};
use crate::lua::{ClassImporter, ImportError, StackImporter};
use crate::process::{SystemRunner, ToolRunner};
use crate::synth::{Context, QUALIFIER_CONTEXT_KEY, StackConstructor};

pub const COMMAND_PREREQUISITES: [&str; 2] = ["node", "npx"];
pub const PACKAGE_PREREQUISITES: [&str; 1] = ["cdk-assets"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
  Command(String),
  NodePackage(String),
}

impl fmt::Display for Prerequisite {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Prerequisite::Command(name) => write!(f, "Command prerequisite '{}'", name),
      Prerequisite::NodePackage(name) => write!(f, "Node Package prerequisite '{}'", name),
    }
  }
}

#[derive(Debug, Error)]
pub enum HandlerError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("template not found: {0}")]
  TemplateNotFound(PathBuf),

  #[error("{0} not found")]
  PrerequisiteMissing(Prerequisite),

  #[error(transparent)]
  Import(#[from] ImportError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error("failed to serialize template: {0}")]
  Serialize(#[from] serde_yaml::Error),
}

/// Context handed to synthesis.
///
/// `qualifier` is added under the bootstrap qualifier key unless the context
/// already sets one.
pub fn resolve_context(context: Option<&Context>, qualifier: Option<&str>) -> Context {
  let mut resolved = context.cloned().unwrap_or_default();
  if let Some(qualifier) = qualifier
    && !resolved.contains_key(QUALIFIER_CONTEXT_KEY)
  {
    resolved.insert(QUALIFIER_CONTEXT_KEY.to_string(), Value::String(qualifier.to_string()));
  }
  resolved
}

/// Check every prerequisite, failing on the first one missing.
pub fn check_prerequisites(prerequisites: &dyn Prerequisites) -> Result<(), HandlerError> {
  for command in COMMAND_PREREQUISITES {
    if !prerequisites.command_exists(command) {
      return Err(HandlerError::PrerequisiteMissing(Prerequisite::Command(command.to_string())));
    }
  }
  for package in PACKAGE_PREREQUISITES {
    if !prerequisites.package_exists(package) {
      return Err(HandlerError::PrerequisiteMissing(Prerequisite::NodePackage(
        package.to_string(),
      )));
    }
  }
  Ok(())
}

pub struct Handler {
  name: String,
  args: HandlerArgs,
  project_path: PathBuf,
  user_data: Value,
  connection: ConnectionSettings,
  base_env: EnvironmentVariables,
  runner: Rc<dyn ToolRunner>,
  prerequisites: Option<Box<dyn Prerequisites>>,
  importer: Option<Box<dyn StackImporter>>,
}

impl Handler {
  /// Handler using real subprocesses and the current process environment.
  pub fn new(name: impl Into<String>, args: HandlerArgs, project_path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      args,
      project_path: project_path.into(),
      user_data: Value::Null,
      connection: ConnectionSettings::default(),
      base_env: process_environment(),
      runner: Rc::new(SystemRunner),
      prerequisites: None,
      importer: None,
    }
  }

  pub fn with_user_data(mut self, user_data: Value) -> Self {
    self.user_data = user_data;
    self
  }

  pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
    self.connection = connection;
    self
  }

  pub fn with_base_env(mut self, base_env: EnvironmentVariables) -> Self {
    self.base_env = base_env;
    self
  }

  /// Runner for builds and, unless [`with_prerequisites`](Self::with_prerequisites)
  /// is used, for the `npm list` package probes.
  pub fn with_runner(mut self, runner: Rc<dyn ToolRunner>) -> Self {
    self.runner = runner;
    self
  }

  pub fn with_prerequisites(mut self, prerequisites: Box<dyn Prerequisites>) -> Self {
    self.prerequisites = Some(prerequisites);
    self
  }

  pub fn with_importer(mut self, importer: Box<dyn StackImporter>) -> Self {
    self.importer = Some(importer);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn args(&self) -> &HandlerArgs {
    &self.args
  }

  pub fn template_path(&self) -> PathBuf {
    resolve_template_path(&self.project_path, &self.args.path)
  }

  /// Context for the configured deployment type.
  ///
  /// The bootstrapless synthesizer does not use a qualifier, so it is only
  /// injected for the other types.
  pub fn context(&self) -> Context {
    match self.args.deployment_type {
      DeploymentType::Bootstrapless => self.args.context.clone().unwrap_or_default(),
      DeploymentType::Bootstrapped | DeploymentType::CdkJson => {
        resolve_context(self.args.context.as_ref(), self.args.bootstrap_qualifier.as_deref())
      }
    }
  }

  /// Argument rules, template existence, then tool prerequisites.
  ///
  /// Nothing is imported or synthesized.
  pub fn validate(&self) -> Result<(), HandlerError> {
    self.args.validate()?;

    let template_path = self.template_path();
    if !template_path.exists() {
      return Err(HandlerError::TemplateNotFound(template_path));
    }

    match &self.prerequisites {
      Some(prerequisites) => check_prerequisites(prerequisites.as_ref())?,
      None => check_prerequisites(&CommandChecker::new(self.runner.clone()))?,
    }
    debug!(handler = %self.name, "handler arguments valid");
    Ok(())
  }

  fn import(&self, path: &Path) -> Result<Box<dyn StackConstructor>, HandlerError> {
    let class_name = self.args.class_name();
    let constructor = match &self.importer {
      Some(importer) => importer.import_class(path, class_name)?,
      None => ClassImporter::new()?.import_class(path, class_name)?,
    };
    Ok(constructor)
  }

  fn builder(&self) -> Result<Builder, HandlerError> {
    let toolkit = Toolkit::new(self.runner.clone(), self.connection.clone(), self.base_env.clone());
    let template_path = self.template_path();

    Ok(match self.args.deployment_type {
      DeploymentType::Bootstrapped => Builder::Bootstrapped(BootstrappedBuilder::new(toolkit, self.import(&template_path)?)),
      DeploymentType::Bootstrapless => Builder::Bootstrapless(BootstraplessBuilder::new(
        toolkit,
        self.import(&template_path)?,
        self.args.bootstrapless_options(),
      )),
      DeploymentType::CdkJson => {
        let stack_logical_id = self.args.stack_logical_id.clone().ok_or_else(|| {
          ConfigError::Invalid("stack_logical_id is required for the cdk_json deployment_type".to_string())
        })?;
        Builder::CdkJson(CdkJsonBuilder::new(
          toolkit,
          template_path,
          stack_logical_id,
          self.args.bootstrapless_options(),
        ))
      }
    })
  }

  /// Build the template and serialize it as YAML with sorted keys.
  pub fn handle(&self) -> Result<String, HandlerError> {
    self.args.validate()?;
    info!(
      handler = %self.name,
      deployment_type = %self.args.deployment_type,
      path = %self.template_path().display(),
      "handling template"
    );

    let builder = self.builder()?;
    let template = builder.build_template(&self.context(), &self.user_data)?;
    Ok(serde_yaml::to_string(&template)?)
  }

  /// [`validate`](Self::validate) then [`handle`](Self::handle).
  pub fn render(&self) -> Result<String, HandlerError> {
    self.validate()?;
    self.handle()
  }
}
