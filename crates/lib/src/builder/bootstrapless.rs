use std::collections::BTreeMap;

use serde_json::Value;

use super::{BuildError, Toolkit, build_in_process};
use crate::synth::{BootstraplessSynthesizer, Context, StackConstructor, StackSynthesizer};

/// Builds stacks whose assets go to explicitly configured locations.
///
/// The constructor receives the bootstrapless synthesizer through its props.
pub struct BootstraplessBuilder {
  toolkit: Toolkit,
  constructor: Box<dyn StackConstructor>,
  options: BTreeMap<String, String>,
}

impl BootstraplessBuilder {
  pub fn new(toolkit: Toolkit, constructor: Box<dyn StackConstructor>, options: BTreeMap<String, String>) -> Self {
    Self {
      toolkit,
      constructor,
      options,
    }
  }

  pub fn build_template(&self, context: &Context, user_data: &Value) -> Result<Value, BuildError> {
    let synthesizer = BootstraplessSynthesizer::from_options(&self.options).map_err(|e| {
      BuildError::ConfigInvalid(format!(
        "Error encountered attempting to instantiate the bootstrapless synthesizer with the specified deployment config: {}",
        e
      ))
    })?;

    build_in_process(
      &self.toolkit,
      self.constructor.as_ref(),
      context,
      user_data,
      Some(StackSynthesizer::Bootstrapless(synthesizer)),
    )
  }
}
