//! Advisory overlap detection.
//!
//! Lists the files a mod would overwrite in a tree. This is informational
//! only; git decides what actually survives a merge.

use std::io;
use std::path::{Path, PathBuf};

use crate::fsutil;

/// Relative paths present as files under both `base_dir` and `mod_dir`,
/// sorted. `.git` is ignored on both sides.
///
/// # Errors
/// Fails if either tree cannot be listed.
pub fn find_overlaps(base_dir: &Path, mod_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let base = fsutil::list_files(base_dir)?;
    let theirs = fsutil::list_files(mod_dir)?;
    Ok(base.intersection(&theirs).cloned().collect())
}
