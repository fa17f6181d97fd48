//! The load order: mods in the order the user loaded them.
//!
//! Keys are unique. Iteration follows insertion order; compilation uses
//! [`LoadOrder::effective_order`], which re-sorts by required base version
//! and keeps insertion order among equal versions.

use std::collections::HashMap;
use std::io;

use tracing::{debug, warn};

use super::mod_def::{Mod, ModKey};

/// Result of [`LoadOrder::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// The mod was appended.
    Loaded,
    /// A mod with the same key is already loaded. The load order is
    /// unchanged and the rejected mod is handed back to the caller.
    Duplicate(Mod),
}

impl LoadOutcome {
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

#[derive(Debug)]
struct Entry {
    /// Monotonic insertion counter; never reused.
    position: u64,
    loaded: Mod,
}

/// Insertion-ordered map from [`ModKey`] to [`Mod`].
#[derive(Debug, Default)]
pub struct LoadOrder {
    entries: Vec<Entry>,
    index: HashMap<ModKey, usize>,
    next_position: u64,
}

impl LoadOrder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `loaded` under its key.
    pub fn load(&mut self, loaded: Mod) -> LoadOutcome {
        let key = loaded.key().clone();
        if self.index.contains_key(&key) {
            warn!(key = %key, "redundant load: mod is already loaded");
            return LoadOutcome::Duplicate(loaded);
        }
        debug!(key = %key, name = loaded.name(), "mod loaded");
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry {
            position: self.next_position,
            loaded,
        });
        self.next_position += 1;
        LoadOutcome::Loaded
    }

    /// Remove the mod under `key`, deleting its extracted files.
    ///
    /// Returns `Ok(false)` if no such mod is loaded.
    ///
    /// # Errors
    /// Returns the I/O error from deleting the extracted files. The entry is
    /// removed either way.
    pub fn remove(&mut self, key: &ModKey) -> io::Result<bool> {
        let Some(slot) = self.index.remove(key) else {
            return Ok(false);
        };
        let entry = self.entries.remove(slot);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        debug!(key = %key, "mod unloaded");
        entry.loaded.release()?;
        Ok(true)
    }

    /// Remove every mod, deleting their extracted files.
    ///
    /// # Errors
    /// Returns the first I/O error after attempting every mod. The load
    /// order is empty either way.
    pub fn clear(&mut self) -> io::Result<()> {
        self.index.clear();
        let mut first_err = None;
        for entry in self.entries.drain(..) {
            if let Err(e) = entry.loaded.release() {
                first_err.get_or_insert(e);
            }
        }
        debug!("load order cleared");
        first_err.map_or(Ok(()), Err)
    }

    #[must_use]
    pub fn get(&self, key: &ModKey) -> Option<&Mod> {
        self.index.get(key).map(|&slot| &self.entries[slot].loaded)
    }

    #[must_use]
    pub fn contains(&self, key: &ModKey) -> bool {
        self.index.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mods in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Mod> {
        self.entries.iter().map(|e| &e.loaded)
    }

    /// Mods sorted by required version, then by insertion position.
    #[must_use]
    pub fn effective_order(&self) -> Vec<&Mod> {
        let mut sorted: Vec<&Entry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            a.loaded
                .version()
                .cmp(b.loaded.version())
                .then(a.position.cmp(&b.position))
        });
        sorted.into_iter().map(|e| &e.loaded).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::version::Version;
    use proptest::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn make_mod(file: &str, version: &[u32]) -> Mod {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), file).unwrap();
        Mod::new(
            Some(file.to_owned()),
            Version::new(version.to_vec()),
            PathBuf::from(format!("/mods/mod/{file}.mod")),
            dir,
            &MergeConfig::default(),
        )
        .unwrap()
    }

    fn names(order: &[&Mod]) -> Vec<String> {
        order.iter().map(|m| m.name().to_owned()).collect()
    }

    #[test]
    fn load_keeps_insertion_order() {
        let mut lo = LoadOrder::new();
        assert!(lo.load(make_mod("b", &[1, 0, 1])).is_loaded());
        assert!(lo.load(make_mod("a", &[1, 0, 0])).is_loaded());
        let order: Vec<&str> = lo.iter().map(Mod::name).collect();
        assert_eq!(order, ["b", "a"]);
    }

    #[test]
    fn duplicate_load_is_a_no_op_and_keeps_first_files() {
        let mut lo = LoadOrder::new();
        lo.load(make_mod("a", &[1, 0, 0]));
        let first_root = lo.iter().next().unwrap().root().to_path_buf();

        let outcome = lo.load(make_mod("A", &[2, 0, 0]));
        let LoadOutcome::Duplicate(rejected) = outcome else {
            panic!("expected duplicate");
        };
        assert_eq!(rejected.name(), "A");
        rejected.release().unwrap();

        assert_eq!(lo.len(), 1);
        assert!(first_root.exists());
        assert_eq!(lo.iter().next().unwrap().name(), "a");
    }

    #[test]
    fn remove_deletes_files_and_reindexes() {
        let mut lo = LoadOrder::new();
        lo.load(make_mod("a", &[1, 0, 0]));
        lo.load(make_mod("b", &[1, 0, 0]));
        lo.load(make_mod("c", &[1, 0, 0]));
        let key_a = ModKey::from_path(Path::new("/mods/mod/a.mod"));
        let key_c = ModKey::from_path(Path::new("/mods/mod/c.mod"));
        let root_a = lo.get(&key_a).unwrap().root().to_path_buf();

        assert!(lo.remove(&key_a).unwrap());
        assert!(!root_a.exists());
        assert!(!lo.remove(&key_a).unwrap());
        assert_eq!(lo.len(), 2);
        assert_eq!(lo.get(&key_c).unwrap().name(), "c");
    }

    #[test]
    fn clear_deletes_every_tree() {
        let mut lo = LoadOrder::new();
        lo.load(make_mod("a", &[1, 0, 0]));
        lo.load(make_mod("b", &[1, 0, 1]));
        let roots: Vec<PathBuf> = lo.iter().map(|m| m.root().to_path_buf()).collect();
        lo.clear().unwrap();
        assert!(lo.is_empty());
        assert!(roots.iter().all(|r| !r.exists()));
    }

    #[test]
    fn effective_order_sorts_by_version_then_position() {
        let mut lo = LoadOrder::new();
        lo.load(make_mod("new", &[2, 0, 0]));
        lo.load(make_mod("old-1", &[1, 0, 0]));
        lo.load(make_mod("mid", &[1, 0, 1]));
        lo.load(make_mod("old-2", &[1, 0, 0]));
        assert_eq!(
            names(&lo.effective_order()),
            ["old-1", "old-2", "mid", "new"]
        );
    }

    #[test]
    fn position_survives_removal() {
        let mut lo = LoadOrder::new();
        lo.load(make_mod("x", &[1, 0, 0]));
        lo.load(make_mod("y", &[1, 0, 0]));
        lo.remove(&ModKey::from_path(Path::new("/mods/mod/x.mod")))
            .unwrap();
        lo.load(make_mod("x", &[1, 0, 0]));
        assert_eq!(names(&lo.effective_order()), ["y", "x"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn effective_order_is_stable(versions in prop::collection::vec(0u32..3, 1..12)) {
            let mut lo = LoadOrder::new();
            for (i, v) in versions.iter().enumerate() {
                lo.load(make_mod(&format!("m{i:02}"), &[1, *v, 0]));
            }
            let order = lo.effective_order();
            for pair in order.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.version() <= b.version());
                if a.version() == b.version() {
                    prop_assert!(a.name() < b.name(), "{} before {}", a.name(), b.name());
                }
            }
        }
    }
}
