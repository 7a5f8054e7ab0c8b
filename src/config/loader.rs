// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ProjectFile, RawProjectFile};
use crate::config::store::Config;
use crate::config::CONTEXT_TASKS_KEY;
use crate::errors::Result;

/// File name of the user-level configuration in the home directory.
pub const USER_CONFIG_FILE: &str = ".bud.toml";

/// A loaded project: the validated task/watch declarations plus the
/// layered context configuration (user file beneath project file).
#[derive(Debug, Clone)]
pub struct Project {
    pub file: ProjectFile,
    pub context: Config,
    /// Directory containing the project file; relative watch base
    /// directories are resolved against it.
    pub root: PathBuf,
}

/// Load a project file and return the raw `RawProjectFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawProjectFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load and validate a project file, layering `~/.bud.toml` underneath its
/// `[tasks.*]` tree.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Project> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let file = ProjectFile::try_from(raw)?;

    let mut context = match user_config_path() {
        Some(user_path) if user_path.is_file() => {
            debug!(path = ?user_path, "loading user configuration");
            Config::from_toml_str(&fs::read_to_string(&user_path)?)?
        }
        _ => Config::new(),
    };
    context.merge(
        CONTEXT_TASKS_KEY,
        Config::from_table(file.context_tasks().clone()),
    );

    Ok(Project {
        file,
        context,
        root: project_root_dir(path),
    })
}

/// Default project file: `Bud.toml` in the current working directory.
pub fn default_project_path() -> PathBuf {
    PathBuf::from("Bud.toml")
}

/// `~/.bud.toml`, when a home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(USER_CONFIG_FILE))
}

/// - If the project path has a non-empty parent (e.g. "web/Bud.toml"),
///   that directory is the root.
/// - A bare filename falls back to the current working directory.
fn project_root_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
