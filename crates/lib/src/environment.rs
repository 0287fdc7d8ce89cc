//! Environment variable sets handed to external tools.
//!
//! The set is recomputed for every build from a base environment (normally the
//! handler process's own) and the connection settings supplied by the caller.

use std::collections::BTreeMap;

pub type EnvironmentVariables = BTreeMap<String, String>;

/// Prefix for bootstrapless options exported to an external CDK project.
pub const BOOTSTRAPLESS_ENV_PREFIX: &str = "BSS_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
  pub access_key_id: String,
  pub secret_access_key: String,
  pub session_token: Option<String>,
}

/// Region and resolved credentials for the target account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
  pub region: Option<String>,
  pub credentials: Option<AwsCredentials>,
}

impl ConnectionSettings {
  pub fn new(region: Option<String>) -> Self {
    Self {
      region,
      credentials: None,
    }
  }

  pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
    self.credentials = Some(credentials);
    self
  }
}

/// Snapshot of the current process environment.
///
/// Variables whose name or value is not valid UTF-8 are skipped.
pub fn process_environment() -> EnvironmentVariables {
  std::env::vars_os()
    .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
    .collect()
}

/// Derive the environment for a tool invocation.
///
/// Explicit credentials replace any profile selection from the base
/// environment. A missing session token removes a stale one instead of leaving
/// it next to unrelated keys.
pub fn derive_environment(base: &EnvironmentVariables, connection: &ConnectionSettings) -> EnvironmentVariables {
  let mut env = base.clone();

  if let Some(credentials) = &connection.credentials {
    env.remove("AWS_PROFILE");
    env.insert("AWS_ACCESS_KEY_ID".to_string(), credentials.access_key_id.clone());
    env.insert(
      "AWS_SECRET_ACCESS_KEY".to_string(),
      credentials.secret_access_key.clone(),
    );
    match &credentials.session_token {
      Some(token) => {
        env.insert("AWS_SESSION_TOKEN".to_string(), token.clone());
      }
      None => {
        env.remove("AWS_SESSION_TOKEN");
      }
    }
  }

  if let Some(region) = &connection.region {
    for key in ["AWS_DEFAULT_REGION", "CDK_DEFAULT_REGION", "AWS_REGION"] {
      env.insert(key.to_string(), region.clone());
    }
  }

  env
}

/// Export bootstrapless options as `BSS_<OPTION>` variables.
pub fn add_bootstrapless_variables(env: &mut EnvironmentVariables, options: &BTreeMap<String, String>) {
  for (key, value) in options {
    env.insert(
      format!("{}{}", BOOTSTRAPLESS_ENV_PREFIX, key.to_uppercase()),
      value.clone(),
    );
  }
}
