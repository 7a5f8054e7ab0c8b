// src/watch/selector.rs

//! Glob-based path selection relative to a base directory.
//!
//! Pattern syntax on top of `globset`:
//! - `!pattern` excludes whatever it matches, regardless of order.
//! - `pattern/` only matches directories.
//!
//! `*` does not cross `/`; use `**` for that.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::fs::{FileKind, FileSystem};

#[derive(Clone)]
pub struct Selector {
    patterns: Vec<String>,
    include: Split,
    exclude: Split,
}

/// One side (include or exclude), split by what the patterns may match.
#[derive(Clone)]
struct Split {
    any: GlobSet,
    dirs: GlobSet,
}

impl Split {
    fn is_match(&self, rel: &str, is_dir: bool) -> bool {
        self.any.is_match(rel) || (is_dir && self.dirs.is_match(rel))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl Selector {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .collect();

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pat in &patterns {
            match pat.strip_prefix('!') {
                Some(rest) => exclude.push(rest),
                None => include.push(pat.as_str()),
            }
        }
        if include.is_empty() {
            bail!("no include pattern in {:?}", patterns);
        }

        Ok(Self {
            include: build_split(&include)?,
            exclude: build_split(&exclude)?,
            patterns,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `path` is selected, evaluated relative to `base_dir`.
    /// The base itself and anything outside it never match.
    pub fn is_match(&self, base_dir: &Path, path: &Path, is_dir: bool) -> bool {
        match relative_str(base_dir, path) {
            Some(rel) if !rel.is_empty() => self.is_match_relative(&rel, is_dir),
            _ => false,
        }
    }

    /// Same as [`Selector::is_match`] for an already relative,
    /// forward-slash path.
    pub fn is_match_relative(&self, rel: &str, is_dir: bool) -> bool {
        if !self.include.is_match(rel, is_dir) {
            return false;
        }
        !self.exclude.is_match(rel, is_dir)
    }

    /// Every selected path below `base_dir`, sorted.
    pub fn matches(&self, fs: &dyn FileSystem, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut stack = vec![base_dir.to_path_buf()];

        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                let is_dir = fs.stat(&path)? == FileKind::Dir;
                if is_dir && !fs.is_symlink(&path) {
                    stack.push(path.clone());
                }
                if self.is_match(base_dir, &path, is_dir) {
                    found.push(path);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

fn build_split(patterns: &[&str]) -> Result<Split> {
    let mut any = GlobSetBuilder::new();
    let mut dirs = GlobSetBuilder::new();
    for pat in patterns {
        let (target, glob) = match pat.strip_suffix('/') {
            Some(dir_pat) => (&mut dirs, dir_pat),
            None => (&mut any, *pat),
        };
        let glob = GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        target.add(glob);
    }
    Ok(Split {
        any: any.build()?,
        dirs: dirs.build()?,
    })
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to comparing canonical forms, since notify may report a
/// different absolute prefix for the same directory (symlinks,
/// `/private/var` on macOS).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;
    // Removed paths cannot be canonicalized; canonicalize the parent.
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
