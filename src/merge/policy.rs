//! Conflict-resolution policy.
//!
//! Three rules, and no others:
//!
//! 1. A later mod beats an earlier mod (folding mod branches favors the
//!    branch being merged in).
//! 2. A newer base snapshot beats an older one.
//! 3. Mod content beats base snapshot content.
//!
//! Rules 2 and 3 meet during a base upgrade: a conflicted path that the
//! folded mods changed relative to the old snapshot keeps the mod side;
//! every other conflicted path takes the new snapshot.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use modmerge_git::Side;

/// Side favored when folding mod branches: the incoming (later) mod.
pub const FOLD_SIDE: Side = Side::Theirs;

/// Side a conflicted `path` resolves to while merging a newer snapshot into
/// a branch holding mod content. `mod_touched` is every path the mods
/// changed relative to the old snapshot.
#[must_use]
pub fn upgrade_side(path: &Path, mod_touched: &BTreeSet<PathBuf>) -> Side {
    if mod_touched.contains(path) {
        Side::Ours
    } else {
        Side::Theirs
    }
}
