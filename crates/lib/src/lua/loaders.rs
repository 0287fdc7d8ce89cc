//! Loading Lua files with a per-file `__dir`.
//!
//! Every file loaded through these loaders (the stack definition itself, or
//! anything it pulls in with `require` or `dofile`) runs in its own environment
//! table that inherits from `_G` and carries `__dir`, the directory of the file.
//!
//! `require` keeps its caching and preload behaviour: only
//! `package.searchers[2]` is replaced.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Registry key for the directory of the file currently being loaded.
const CURRENT_DIR_KEY: &str = "__cdk_handler_current_dir";

/// How assignments to undeclared globals behave inside a loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Globals {
  /// Globals land in `_G`, as with a plain `require`.
  Shared,
  /// Globals stay in the file's own environment table.
  Isolated,
}

fn canonical(path: &Path) -> LuaResult<PathBuf> {
  dunce::canonicalize(path).map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))
}

fn environment(lua: &Lua, dir: &str, globals: Globals) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;
  env.set("__dir", dir)?;

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  if globals == Globals::Shared {
    mt.set("__newindex", lua.globals())?;
  }
  env.set_metatable(Some(mt))?;
  Ok(env)
}

/// A loaded file: what the chunk returned and the environment it ran in.
pub struct LoadedModule {
  pub value: LuaValue,
  pub env: LuaTable,
  pub path: PathBuf,
}

/// Load and run a Lua file.
///
/// The chunk receives `(name, path)` as varargs, the same values `require`
/// passes, so `local name = ...` works in files loaded either way.
pub fn load_module(lua: &Lua, path: &Path, name: &str, globals: Globals) -> LuaResult<LoadedModule> {
  let path = canonical(path)?;
  let content =
    fs::read_to_string(&path).map_err(|e| LuaError::external(format!("cannot read '{}': {}", path.display(), e)))?;

  let dir = path.parent().unwrap_or(Path::new(".")).to_string_lossy().into_owned();
  let env = environment(lua, &dir, globals)?;

  let prev_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir)?;

  let path_str = path.to_string_lossy().into_owned();
  let result = lua
    .load(&content)
    .set_name(format!("@{}", path_str))
    .set_environment(env.clone())
    .into_function()
    .and_then(|chunk| chunk.call::<LuaValue>((name, path_str)));

  // Restore even on error; a failure here must not mask the load error.
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, prev_dir);

  Ok(LoadedModule {
    value: result?,
    env,
    path,
  })
}

fn resolve_relative(lua: &Lua, path_str: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path_str);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }

  let current: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  if let Some(current) = current {
    let resolved = Path::new(&current).join(path);
    if resolved.exists() {
      return Ok(resolved);
    }
  }
  Ok(path.to_path_buf())
}

/// `package.searchers[2]` replacement: resolve with `package.searchpath`,
/// load with [`load_module`].
fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let package: LuaTable = lua.globals().get("package")?;
    let path: String = package.get("path")?;
    let searchpath: LuaFunction = package.get("searchpath")?;
    let found: LuaMultiValue = searchpath.call((modname.clone(), path))?;

    match found.into_iter().next() {
      Some(LuaValue::String(filepath)) => {
        let filepath = filepath.to_str()?.to_string();
        let loader = lua.create_function(|lua, (name, file): (String, String)| {
          Ok(load_module(lua, Path::new(&file), &name, Globals::Shared)?.value)
        })?;
        Ok((LuaValue::Function(loader), filepath))
      }
      _ => Ok((LuaValue::Nil, format!("\n\tno file for module '{}'", modname))),
    }
  })
}

/// `dofile` resolving relative paths against the calling file's directory.
fn create_dofile(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, path: Option<String>| match path {
    Some(path_str) => {
      let resolved = resolve_relative(lua, &path_str)?;
      let name = resolved
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
      Ok(load_module(lua, &resolved, &name, Globals::Shared)?.value)
    }
    None => Err(LuaError::external("dofile() without path not supported")),
  })
}

pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;

  lua.globals().set("dofile", create_dofile(lua)?)?;
  Ok(())
}
