//! Lua stack definitions.
//!
//! Stack definitions are Lua files. The importer loads one, works out its
//! module identity from the surrounding `init.lua` packages, and wraps the
//! requested constructor so the builders can call it like any other
//! [`StackConstructor`](crate::synth::StackConstructor).
//!
//! # Submodules
//!
//! - [`bindings`] - the `cdk` Lua module and Lua-defined constructors
//! - [`convert`] - Lua <-> JSON value conversion
//! - [`importer`] - loading a constructor from a file
//! - [`loaders`] - `require`/`dofile` with per-file `__dir`
//! - [`resolver`] - `package.path` search roots
//! - [`runtime`] - Lua VM setup

pub mod bindings;
pub mod convert;
pub mod importer;
pub mod loaders;
pub mod resolver;
pub mod runtime;

pub use bindings::LuaStackConstructor;
pub use importer::{ClassImporter, ImportError, ModuleIdentity, StackImporter, module_identity};
pub use resolver::ModuleResolver;
