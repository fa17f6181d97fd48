//! Directory-tree helpers: listing, copying, and fresh output directories.
//!
//! Every walk skips `.git` so working-copy metadata never leaks into mod
//! trees or compiled output.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn walk(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
}

/// Relative paths of every regular file under `root`, excluding `.git`.
///
/// # Errors
/// Fails if `root` or any directory below it cannot be read.
pub fn list_files(root: &Path) -> io::Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in walk(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.insert(rel.to_path_buf());
        }
    }
    Ok(files)
}

/// Copy every file under `src` for which `keep(relative_path)` holds into
/// `dst`, overwriting existing files and creating directories as needed.
///
/// Returns the relative paths copied, in walk order.
///
/// # Errors
/// Fails on the first unreadable source or unwritable destination.
pub fn copy_tree(
    src: &Path,
    dst: &Path,
    keep: impl Fn(&Path) -> bool,
) -> io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    fs::create_dir_all(dst)?;
    for entry in walk(src) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() && keep(rel) {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied.push(rel.to_path_buf());
        }
    }
    Ok(copied)
}

/// Create and return `<parent>/<name>`, or `<parent>/<name>-N` with the
/// smallest `N >= 1` that does not exist yet.
///
/// # Errors
/// Fails if `parent` cannot be created or a candidate cannot be created for
/// a reason other than already existing.
pub fn fresh_dir(parent: &Path, name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(parent)?;
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            parent.join(name)
        } else {
            parent.join(format!("{name}-{n}"))
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// `path` made absolute against the current directory, with `.` and `..`
/// components folded away lexically. Symlinks are not resolved, so the
/// path need not exist.
#[must_use]
pub fn normalize_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}
