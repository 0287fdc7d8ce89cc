//! The `cdk` Lua module and userdata for the synthesis model.
//!
//! Stack definitions use it like this:
//!
//! ```lua
//! local cdk = require("cdk")
//!
//! function CdkStack(app, id, user_data, props)
//!   local stack = cdk.stack(app, id, props)
//!   local bucket = stack:resource("Bucket", "AWS::S3::Bucket", { BucketName = user_data.bucket })
//!   stack:output("BucketName", { Value = bucket })
//! end
//! ```

use std::path::{Path, PathBuf};

use mlua::prelude::*;
use serde_json::{Value, json};

use super::convert::{json_to_lua, lua_to_json};
use crate::synth::{
  App, FileAssetLocation, ImageAssetLocation, QUALIFIER_CONTEXT_KEY, StackConstructor, StackHandle, StackSynthesizer,
  SynthError,
};

pub const MODULE_NAME: &str = "cdk";

/// Render a string containing pseudo parameters as `Fn::Sub`, otherwise as-is.
fn substitutable(value: &str) -> Value {
  if value.contains("${") {
    json!({ "Fn::Sub": value })
  } else {
    Value::String(value.to_string())
  }
}

impl LuaUserData for App {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("context", |lua, this, key: String| match this.context_value(&key) {
      Some(value) => json_to_lua(lua, &value),
      None => Ok(LuaValue::Nil),
    });
    methods.add_method("stack_ids", |_, this, ()| Ok(this.stack_ids()));
  }
}

impl LuaUserData for StackSynthesizer {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("kind", |_, this| Ok(this.kind()));
  }
}

fn file_location_to_lua(lua: &Lua, location: FileAssetLocation) -> LuaResult<LuaValue> {
  json_to_lua(
    lua,
    &json!({
      "hash": location.hash,
      "bucket_name": substitutable(&location.bucket_name),
      "object_key": location.object_key,
    }),
  )
}

fn image_location_to_lua(lua: &Lua, location: ImageAssetLocation) -> LuaResult<LuaValue> {
  json_to_lua(
    lua,
    &json!({
      "hash": location.hash,
      "repository_name": substitutable(&location.repository_name),
      "image_tag": location.image_tag,
      "image_uri": substitutable(&location.image_uri),
    }),
  )
}

/// Read `path` (or `directory`) from a string or options table.
fn asset_path(opts: &LuaValue, key: &str) -> LuaResult<PathBuf> {
  match opts {
    LuaValue::String(s) => Ok(PathBuf::from(s.to_str()?.to_string())),
    LuaValue::Table(t) => t
      .get::<Option<String>>(key)?
      .map(PathBuf::from)
      .ok_or_else(|| LuaError::external(format!("asset options require a '{}' field", key))),
    other => Err(LuaError::external(format!(
      "expected a string or table, got {}",
      other.type_name()
    ))),
  }
}

impl LuaUserData for StackHandle {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("id", |_, this| Ok(this.id()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method(
      "resource",
      |lua, this, (logical_id, resource_type, properties): (String, String, LuaValue)| {
        let reference = this
          .add_resource(&logical_id, &resource_type, lua_to_json(properties)?)
          .map_err(LuaError::external)?;
        json_to_lua(lua, &reference)
      },
    );

    methods.add_method("parameter", |lua, this, (name, properties): (String, LuaValue)| {
      let reference = this
        .add_parameter(&name, lua_to_json(properties)?)
        .map_err(LuaError::external)?;
      json_to_lua(lua, &reference)
    });

    methods.add_method("output", |_, this, (name, properties): (String, LuaValue)| {
      this
        .add_output(&name, lua_to_json(properties)?)
        .map_err(LuaError::external)
    });

    methods.add_method("file_asset", |lua, this, opts: LuaValue| {
      let path = asset_path(&opts, "path")?;
      let location = this.add_file_asset(&path).map_err(LuaError::external)?;
      file_location_to_lua(lua, location)
    });

    methods.add_method("image_asset", |lua, this, opts: LuaValue| {
      let directory = asset_path(&opts, "directory")?;
      let docker_file = match &opts {
        LuaValue::Table(t) => t.get::<Option<String>>("file")?,
        _ => None,
      };
      let location = this
        .add_image_asset(&directory, docker_file)
        .map_err(LuaError::external)?;
      image_location_to_lua(lua, location)
    });
  }
}

/// Register `cdk` in `package.preload` so `require("cdk")` finds it.
pub fn register_cdk_module(lua: &Lua) -> LuaResult<()> {
  let loader = lua.create_function(|lua, _: LuaMultiValue| create_cdk_module(lua))?;
  let package: LuaTable = lua.globals().get("package")?;
  let preload: LuaTable = package.get("preload")?;
  preload.set(MODULE_NAME, loader)
}

fn create_cdk_module(lua: &Lua) -> LuaResult<LuaTable> {
  let cdk = lua.create_table()?;
  cdk.set("QUALIFIER_CONTEXT_KEY", QUALIFIER_CONTEXT_KEY)?;

  // cdk.stack(app, id, props)
  let stack = lua.create_function(|_, (app, id, props): (LuaUserDataRef<App>, String, Option<LuaTable>)| {
    let (synthesizer, description) = match props {
      Some(props) => {
        let synthesizer = props
          .get::<Option<LuaUserDataRef<StackSynthesizer>>>("synthesizer")?
          .map(|synthesizer| (*synthesizer).clone());
        (synthesizer, props.get::<Option<String>>("description")?)
      }
      None => (None, None),
    };
    app
      .add_stack(&id, synthesizer, description)
      .map_err(LuaError::external)
  })?;
  cdk.set("stack", stack)?;

  // cdk.get_att(logical_id, attribute)
  let get_att = lua.create_function(|lua, (logical_id, attribute): (String, String)| {
    json_to_lua(lua, &json!({ "Fn::GetAtt": [logical_id, attribute] }))
  })?;
  cdk.set("get_att", get_att)?;

  // cdk.sub(text)
  let sub = lua.create_function(|lua, text: String| json_to_lua(lua, &json!({ "Fn::Sub": text })))?;
  cdk.set("sub", sub)?;

  Ok(cdk)
}

#[derive(Clone)]
enum Constructor {
  Function(LuaFunction),
  /// A table with a `new` function, called as `Class:new(...)`.
  Class { class: LuaTable, new: LuaFunction },
}

/// A stack constructor defined in Lua.
///
/// Called as `ctor(app, id, user_data, props)`; `props.synthesizer` is set when
/// a synthesizer was supplied.
#[derive(Clone)]
pub struct LuaStackConstructor {
  lua: Lua,
  constructor: Constructor,
  name: String,
  source: PathBuf,
}

impl LuaStackConstructor {
  /// Wrap a Lua value, or hand it back if it cannot construct stacks.
  pub fn from_value(lua: &Lua, value: LuaValue, name: &str, source: &Path) -> Result<Self, LuaValue> {
    let constructor = match value {
      LuaValue::Function(f) => Constructor::Function(f),
      LuaValue::Table(class) => match class.get::<LuaValue>("new") {
        Ok(LuaValue::Function(new)) => Constructor::Class { class, new },
        _ => return Err(LuaValue::Table(class)),
      },
      other => return Err(other),
    };
    Ok(Self {
      lua: lua.clone(),
      constructor,
      name: name.to_string(),
      source: source.to_path_buf(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  fn call(
    &self,
    app: &App,
    id: &str,
    user_data: &Value,
    synthesizer: Option<&StackSynthesizer>,
  ) -> LuaResult<()> {
    let lua = &self.lua;
    let app = lua.create_userdata(app.clone())?;
    let user_data = json_to_lua(lua, user_data)?;
    let props = lua.create_table()?;
    if let Some(synthesizer) = synthesizer {
      props.set("synthesizer", lua.create_userdata(synthesizer.clone())?)?;
    }

    match &self.constructor {
      Constructor::Function(f) => f.call::<()>((app, id, user_data, props)),
      Constructor::Class { class, new } => new.call::<()>((class.clone(), app, id, user_data, props)),
    }
  }
}

impl StackConstructor for LuaStackConstructor {
  fn construct(
    &self,
    app: &App,
    id: &str,
    user_data: &Value,
    synthesizer: Option<&StackSynthesizer>,
  ) -> Result<(), SynthError> {
    self
      .call(app, id, user_data, synthesizer)
      .map_err(|e| SynthError::Construct(format!("{} ({}): {}", self.name, self.source.display(), e).into()))
  }
}
