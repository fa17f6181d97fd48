//! A loaded mod and its extracted file tree.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::MergeConfig;
use crate::fsutil;
use crate::version::Version;

/// Name shown for mods whose definition has no `name`.
pub const UNNAMED: &str = "unnamed";

// ---------------------------------------------------------------------------
// ModKey
// ---------------------------------------------------------------------------

/// Identity of a mod in the load order: its definition path made absolute,
/// with `.` and `..` folded, forward slashes, and lower case, so the same
/// file is recognized however it was spelled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModKey(String);

impl ModKey {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(
            fsutil::normalize_absolute(path)
                .to_string_lossy()
                .replace('\\', "/")
                .to_lowercase(),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Mod
// ---------------------------------------------------------------------------

/// A mod ready to compile: metadata from its definition plus a private copy
/// of its files.
///
/// The copy lives in a temporary directory owned by the mod. It is removed
/// by [`release`](Self::release), or when the mod is dropped.
#[derive(Debug)]
pub struct Mod {
    name: Option<String>,
    version: Version,
    definition: PathBuf,
    key: ModKey,
    root: PathBuf,
    files: Option<TempDir>,
    mergeable: Vec<PathBuf>,
    opaque: Vec<PathBuf>,
}

impl Mod {
    /// Wrap an extracted tree, partitioning its files by `merge`'s
    /// mergeable extensions.
    ///
    /// # Errors
    /// Fails if the extracted tree cannot be listed.
    pub fn new(
        name: Option<String>,
        version: Version,
        definition: PathBuf,
        files: TempDir,
        merge: &MergeConfig,
    ) -> io::Result<Self> {
        let (mergeable, opaque): (Vec<PathBuf>, Vec<PathBuf>) = fsutil::list_files(files.path())?
            .into_iter()
            .partition(|p| merge.is_mergeable(p));
        Ok(Self {
            name,
            version,
            key: ModKey::from_path(&definition),
            definition,
            root: files.path().to_path_buf(),
            files: Some(files),
            mergeable,
            opaque,
        })
    }

    /// Display name, or [`UNNAMED`].
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    /// The `name` from the definition, if it had one.
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Base version the mod was written for.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// Path of the `.mod` definition file.
    #[must_use]
    pub fn definition(&self) -> &Path {
        &self.definition
    }

    /// File name of the definition (`ugc_123.mod`).
    #[must_use]
    pub fn file_name(&self) -> String {
        self.definition
            .file_name()
            .map_or_else(|| self.key.to_string(), |n| n.to_string_lossy().into_owned())
    }

    #[must_use]
    pub const fn key(&self) -> &ModKey {
        &self.key
    }

    /// Root of the extracted file tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files merged line by line, relative to [`root`](Self::root).
    #[must_use]
    pub fn mergeable_files(&self) -> &[PathBuf] {
        &self.mergeable
    }

    /// Files replaced whole, relative to [`root`](Self::root).
    #[must_use]
    pub fn opaque_files(&self) -> &[PathBuf] {
        &self.opaque
    }

    /// Delete the extracted tree now, reporting failures.
    ///
    /// # Errors
    /// Returns the I/O error from removing the directory.
    pub fn release(mut self) -> io::Result<()> {
        match self.files.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name(), self.version)
    }
}
