//! Loading stack constructors from Lua files.
//!
//! A stack definition can live anywhere on disk. Before running it, the
//! importer reconstructs the module name the file would have if it were
//! `require`d from the working directory, and registers the directories
//! between the two as search roots, so the file's own `require` calls
//! resolve the same way in both cases.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::bindings::LuaStackConstructor;
use super::loaders::{self, Globals};
use super::resolver::ModuleResolver;
use super::runtime::create_runtime;
use crate::synth::StackConstructor;

/// Marker file that turns a directory into a Lua package.
pub const PACKAGE_MARKER: &str = "init.lua";

const LUA_KEYWORDS: [&str; 22] = [
  "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in", "local", "nil", "not",
  "or", "repeat", "return", "then", "true", "until", "while",
];

#[derive(Debug, Error)]
pub enum ImportError {
  #[error("failed to load stack definition {path}: {message}")]
  Load { path: PathBuf, message: String },

  #[error("No class named {class_name} on template at {path}")]
  ClassNotFound { class_name: String, path: PathBuf },

  #[error("'{class_name}' on template at {path} is not a stack constructor: expected a function or a table with a 'new' function")]
  NotConstructor { class_name: String, path: PathBuf },

  #[error("cannot determine working directory: {0}")]
  WorkingDir(#[source] std::io::Error),

  #[error("failed to initialize Lua runtime: {0}")]
  Runtime(String),
}

/// Loads a named stack constructor from a file.
#[cfg_attr(test, mockall::automock)]
pub trait StackImporter {
  fn import_class(&self, path: &Path, class_name: &str) -> Result<Box<dyn StackConstructor>, ImportError>;
}

/// Whether `name` can appear as a segment of a dotted module name.
pub fn is_lua_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
  valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !LUA_KEYWORDS.contains(&name)
}

/// The dotted module name of a file and the directories to search for its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
  pub name: String,
  /// The working directory first, then every directory visited walking up from the file.
  pub search_roots: Vec<PathBuf>,
}

/// Work out the module identity of `file` relative to `working_dir`.
///
/// Both paths are expected to be canonical. Walking up from the file's
/// directory, each directory containing `init.lua` with an identifier-safe
/// name is prepended to the name; the first directory that fails stops the
/// name from growing, but the walk still visits everything up to (not
/// including) the working directory.
pub fn module_identity(file: &Path, working_dir: &Path) -> ModuleIdentity {
  let stem = file
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let parent = file.parent().unwrap_or(Path::new("."));
  let mut search_roots = vec![working_dir.to_path_buf()];

  if !file.starts_with(working_dir) {
    search_roots.push(parent.to_path_buf());
    return ModuleIdentity {
      name: stem,
      search_roots,
    };
  }

  let mut segments = vec![stem];
  let mut growing = true;
  let mut current = Some(parent);

  while let Some(dir) = current
    && dir != working_dir
    && dir.starts_with(working_dir)
  {
    search_roots.push(dir.to_path_buf());
    if growing {
      let name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
      if dir.join(PACKAGE_MARKER).is_file() && is_lua_identifier(&name) {
        segments.insert(0, name);
      } else {
        growing = false;
      }
    }
    current = dir.parent();
  }

  ModuleIdentity {
    name: segments.join("."),
    search_roots,
  }
}

/// [`StackImporter`] backed by one Lua VM.
///
/// The VM and the search roots live as long as the importer; roots only grow.
pub struct ClassImporter {
  lua: Lua,
  resolver: RefCell<ModuleResolver>,
  working_dir: Option<PathBuf>,
}

impl ClassImporter {
  pub fn new() -> Result<Self, ImportError> {
    let lua = create_runtime().map_err(|e| ImportError::Runtime(e.to_string()))?;
    let resolver = ModuleResolver::from_runtime(&lua).map_err(|e| ImportError::Runtime(e.to_string()))?;
    Ok(Self {
      lua,
      resolver: RefCell::new(resolver),
      working_dir: None,
    })
  }

  /// Use `dir` instead of the process working directory.
  pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }

  pub fn search_roots(&self) -> Vec<PathBuf> {
    self.resolver.borrow().search_roots().to_vec()
  }

  fn working_dir(&self) -> Result<PathBuf, ImportError> {
    let dir = match &self.working_dir {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().map_err(ImportError::WorkingDir)?,
    };
    dunce::canonicalize(&dir).map_err(ImportError::WorkingDir)
  }

  fn register(&self, identity: &ModuleIdentity) -> Result<(), ImportError> {
    let mut resolver = self.resolver.borrow_mut();
    for root in &identity.search_roots {
      resolver.register_search_root(root);
    }
    resolver
      .install(&self.lua)
      .map_err(|e| ImportError::Runtime(e.to_string()))
  }
}

impl StackImporter for ClassImporter {
  fn import_class(&self, path: &Path, class_name: &str) -> Result<Box<dyn StackConstructor>, ImportError> {
    let load_error = |message: String| ImportError::Load {
      path: path.to_path_buf(),
      message,
    };

    let file = dunce::canonicalize(path).map_err(|e| load_error(e.to_string()))?;
    let identity = module_identity(&file, &self.working_dir()?);
    self.register(&identity)?;
    let resolved = self.resolver.borrow().resolve(&identity.name);
    debug!(
      path = %file.display(),
      module = %identity.name,
      resolved = ?resolved,
      class_name,
      "importing stack definition"
    );

    let loaded = loaders::load_module(&self.lua, &file, &identity.name, Globals::Isolated)
      .map_err(|e| load_error(e.to_string()))?;

    let mut value = match &loaded.value {
      LuaValue::Table(module) => module.raw_get::<LuaValue>(class_name).map_err(|e| load_error(e.to_string()))?,
      _ => LuaValue::Nil,
    };
    if value.is_nil() {
      value = loaded
        .env
        .raw_get::<LuaValue>(class_name)
        .map_err(|e| load_error(e.to_string()))?;
    }
    if value.is_nil() {
      return Err(ImportError::ClassNotFound {
        class_name: class_name.to_string(),
        path: path.to_path_buf(),
      });
    }

    let constructor = LuaStackConstructor::from_value(&self.lua, value, class_name, &file).map_err(|_| {
      ImportError::NotConstructor {
        class_name: class_name.to_string(),
        path: path.to_path_buf(),
      }
    })?;
    debug!(class_name = constructor.name(), source = %constructor.source().display(), "loaded stack constructor");
    Ok(Box::new(constructor))
  }
}
