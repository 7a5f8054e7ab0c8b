// src/config/mod.rs

//! Configuration for bud.
//!
//! - [`store`]: the hierarchical [`Config`] tree (dotted lookup, typed
//!   accessors, deep merge).
//! - [`bind`]: projection of configuration layers onto executor fields.
//! - [`model`]: the `Bud.toml` project file (tasks, watches, promotions).
//! - [`loader`]: reading the project file and layering the user-level
//!   `~/.bud.toml` beneath it.
//! - [`validate`]: semantic checks turning a raw project file into a
//!   validated one.

pub mod bind;
pub mod loader;
pub mod model;
pub mod store;
pub mod validate;

pub use bind::{Bindable, FieldMap, FieldSlot, bind};
pub use loader::{Project, default_project_path, load_and_validate, load_from_path};
pub use model::{ProjectFile, RawProjectFile, TaskEntry, WatchEntry};
pub use store::Config;

/// Root key of the context configuration holding group and task layers.
pub const CONTEXT_TASKS_KEY: &str = "tasks";
