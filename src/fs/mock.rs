// src/fs/mock.rs

use super::{FileKind, FileSystem};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
enum MockEntry {
    File,
    Dir(BTreeSet<String>),
}

/// In-memory tree for tests. Paths are used verbatim; `canonicalize` is
/// the identity, so tests should stick to one spelling per path.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
    unreadable: Arc<Mutex<BTreeSet<PathBuf>>>,
    symlinks: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        entries.insert(path.to_path_buf(), MockEntry::File);
        link_to_parent(&mut entries, path);
    }

    /// Add a directory and its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        ensure_dir(&mut entries, path.as_ref());
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        entries.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
                children.remove(&name.to_string_lossy().into_owned());
            }
        }
    }

    /// Make `read_dir` fail for `path`, like a directory without
    /// permissions.
    pub fn deny_read(&self, path: impl AsRef<Path>) {
        lock(&self.unreadable).insert(path.as_ref().to_path_buf());
    }

    /// Add a directory that reports itself as a symbolic link.
    pub fn add_symlinked_dir(&self, path: impl AsRef<Path>) {
        self.add_dir(path.as_ref());
        lock(&self.symlinks).insert(path.as_ref().to_path_buf());
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        lock(&self.entries)
    }
}

fn ensure_dir(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(BTreeSet::new()));
    link_to_parent(entries, path);
}

fn link_to_parent(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return;
    };
    if parent.as_os_str().is_empty() {
        return;
    }
    ensure_dir(entries, parent);
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        children.insert(name.to_string_lossy().into_owned());
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> Result<FileKind> {
        Ok(match self.lock().get(path) {
            Some(MockEntry::File) => FileKind::File,
            Some(MockEntry::Dir(_)) => FileKind::Dir,
            None => FileKind::Missing,
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if lock(&self.unreadable).contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match self.lock().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    fn is_symlink(&self, path: &Path) -> bool {
        lock(&self.symlinks).contains(path)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
