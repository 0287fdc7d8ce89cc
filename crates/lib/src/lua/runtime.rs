use mlua::prelude::*;

use super::{bindings, loaders};

/// Create the Lua runtime stack definitions run in.
///
/// Installs the `__dir`-aware loaders and preloads the `cdk` module.
pub fn create_runtime() -> LuaResult<Lua> {
  let lua = Lua::new();
  loaders::install_loaders(&lua)?;
  bindings::register_cdk_module(&lua)?;
  Ok(lua)
}
