//! Module search path management.
//!
//! Stack definitions `require` their siblings through Lua's `package.path`.
//! The resolver owns the list of search roots and renders them into
//! `package.path`, ahead of Lua's default entries.

use std::path::PathBuf;

use mlua::prelude::*;

/// Ordered, append-only list of directories searched by `require`.
///
/// Registering a root twice is allowed; the earlier entry always wins, so
/// duplicates never change which file a module name resolves to.
#[derive(Debug, Clone, Default)]
pub struct ModuleResolver {
  roots: Vec<PathBuf>,
  base_path: String,
}

impl ModuleResolver {
  /// `base_path` is the `package.path` the runtime started with.
  pub fn new(base_path: impl Into<String>) -> Self {
    Self {
      roots: Vec::new(),
      base_path: base_path.into(),
    }
  }

  /// Create a resolver seeded with the runtime's current `package.path`.
  pub fn from_runtime(lua: &Lua) -> LuaResult<Self> {
    let package: LuaTable = lua.globals().get("package")?;
    Ok(Self::new(package.get::<String>("path")?))
  }

  pub fn register_search_root(&mut self, dir: impl Into<PathBuf>) {
    self.roots.push(dir.into());
  }

  pub fn search_roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// `<root>/?.lua;<root>/?/init.lua` for every root, then the base path.
  pub fn package_path(&self) -> String {
    let mut entries: Vec<String> = Vec::with_capacity(self.roots.len() * 2 + 1);
    for root in &self.roots {
      let root = root.to_string_lossy();
      entries.push(format!("{}/?.lua", root));
      entries.push(format!("{}/?/init.lua", root));
    }
    if !self.base_path.is_empty() {
      entries.push(self.base_path.clone());
    }
    entries.join(";")
  }

  /// Find the file a dotted module name resolves to within the search roots.
  pub fn resolve(&self, module: &str) -> Option<PathBuf> {
    let relative = module.replace('.', "/");
    self.roots.iter().find_map(|root| {
      [
        root.join(format!("{}.lua", relative)),
        root.join(&relative).join("init.lua"),
      ]
      .into_iter()
      .find(|candidate| candidate.is_file())
    })
  }

  /// Write the rendered search path into `package.path`.
  pub fn install(&self, lua: &Lua) -> LuaResult<()> {
    let package: LuaTable = lua.globals().get("package")?;
    package.set("path", self.package_path())
  }
}
