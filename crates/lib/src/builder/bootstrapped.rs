use serde_json::Value;

use super::{BuildError, Toolkit, build_in_process};
use crate::synth::{Context, StackConstructor};

/// Builds stacks whose assets go to the resources created by `cdk bootstrap`.
///
/// The bootstrap qualifier is read from the context by the default synthesizer.
pub struct BootstrappedBuilder {
  toolkit: Toolkit,
  constructor: Box<dyn StackConstructor>,
}

impl BootstrappedBuilder {
  pub fn new(toolkit: Toolkit, constructor: Box<dyn StackConstructor>) -> Self {
    Self { toolkit, constructor }
  }

  pub fn build_template(&self, context: &Context, user_data: &Value) -> Result<Value, BuildError> {
    build_in_process(&self.toolkit, self.constructor.as_ref(), context, user_data, None)
  }
}
