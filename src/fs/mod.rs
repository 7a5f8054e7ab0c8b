// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub mod mock;

/// What a path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Missing,
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Classify `path`. A path that does not exist is `Ok(Missing)`, not an
    /// error; permission problems and the like are errors.
    fn stat(&self, path: &Path) -> Result<FileKind>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    fn exists(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::File | FileKind::Dir))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::Dir))
    }

    /// Whether `path` itself is a symbolic link. Walks never descend
    /// through links.
    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> Result<FileKind> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(FileKind::Dir),
            Ok(_) => Ok(FileKind::File),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FileKind::Missing),
            Err(err) => Err(err).with_context(|| format!("stat {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false)
    }
}

/// `root` and every directory below it, sorted.
pub fn walk_dirs(fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            // The base itself must be readable.
            Err(err) if dir == root => return Err(err),
            Err(err) => {
                warn!(path = ?dir, "skipping unreadable directory: {err:#}");
                continue;
            }
        };
        for path in entries {
            if !fs.is_dir(&path) {
                continue;
            }
            if fs.is_symlink(&path) {
                debug!(path = ?path, "not following symlinked directory");
                continue;
            }
            stack.push(path);
        }
        dirs.push(dir);
    }

    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stat_reports_missing_without_error() {
        let dir = tempdir().unwrap();
        let fs = RealFileSystem;
        assert_eq!(fs.stat(dir.path()).unwrap(), FileKind::Dir);
        assert_eq!(fs.stat(&dir.path().join("nope")).unwrap(), FileKind::Missing);

        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        assert_eq!(fs.stat(&dir.path().join("a.txt")).unwrap(), FileKind::File);
    }

    #[test]
    fn walk_dirs_includes_root_and_nested_dirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/inner")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();

        let dirs = walk_dirs(&RealFileSystem, dir.path()).unwrap();
        assert_eq!(
            dirs,
            vec![
                dir.path().to_path_buf(),
                dir.path().join("src"),
                dir.path().join("src/inner"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn walk_dirs_does_not_follow_symlink_loops() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/inner")).unwrap();
        std::os::unix::fs::symlink("..", dir.path().join("src/up")).unwrap();

        let fs = RealFileSystem;
        assert!(fs.is_symlink(&dir.path().join("src/up")));
        assert!(!fs.is_symlink(&dir.path().join("src")));

        let dirs = walk_dirs(&fs, dir.path()).unwrap();
        assert_eq!(
            dirs,
            vec![
                dir.path().to_path_buf(),
                dir.path().join("src"),
                dir.path().join("src/inner"),
            ]
        );
    }

    #[test]
    fn unreadable_subdirectory_is_skipped_but_missing_root_fails() {
        let fs = mock::MockFileSystem::new();
        fs.add_dir("/p/src");
        fs.add_dir("/p/locked");
        fs.deny_read("/p/locked");

        assert_eq!(
            walk_dirs(&fs, Path::new("/p")).unwrap(),
            vec![PathBuf::from("/p"), PathBuf::from("/p/src")]
        );
        assert!(walk_dirs(&fs, Path::new("/nowhere")).is_err());
    }
}
