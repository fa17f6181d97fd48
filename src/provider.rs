//! Finding mod definitions and extracting mods.
//!
//! [`ModProvider`] is the seam between the engine and wherever mods come
//! from. [`FsModProvider`] reads the game's user directory: definitions in
//! `<mods_dir>/mod/*.mod`, loose mod files wherever a definition's `path`
//! points (relative paths resolve against `<mods_dir>`).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{MergeConfig, PathsConfig};
use crate::error::ModMergeError;
use crate::fsutil;
use crate::model::{DEFINITION_EXTENSION, Mod, ModDescriptor, ModKey};
use crate::version::Version;

/// One result of [`ModProvider::search`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// The mod's declared name.
    pub name: String,
    pub definition: PathBuf,
    /// Byte offset of the match inside the lower-cased name.
    pub rank: usize,
}

/// Source of loadable mods.
pub trait ModProvider {
    /// Map a user-supplied id (`ugc_123`, `ugc_123.mod`, a path relative to
    /// the definitions folder, or an absolute path) to a definition path
    /// and its load-order key.
    fn resolve_id(&self, id: &str) -> (PathBuf, ModKey);

    /// Definitions whose name contains `query`, case-insensitively, best
    /// match (earliest position) first.
    ///
    /// # Errors
    /// Fails if the definitions folder cannot be read.
    fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModMergeError>;

    /// Read a definition and extract its files to a private temporary
    /// directory.
    ///
    /// # Errors
    /// [`ModMergeError::ModResolution`] when the definition is missing or
    /// unusable; nothing is left behind on failure.
    fn load(&self, definition: &Path) -> Result<Mod, ModMergeError>;
}

/// [`ModProvider`] over the local file system.
#[derive(Clone, Debug)]
pub struct FsModProvider {
    mods_dir: PathBuf,
    definitions_dir: PathBuf,
    extract_root: PathBuf,
    merge: MergeConfig,
}

impl FsModProvider {
    /// A provider reading definitions under `paths.mods_dir` and
    /// extracting mods into `extract_root`.
    #[must_use]
    pub fn new(paths: &PathsConfig, merge: &MergeConfig, extract_root: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: paths.mods_dir.clone(),
            definitions_dir: paths.definitions_dir(),
            extract_root: extract_root.into(),
            merge: merge.clone(),
        }
    }

    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    fn resolution(definition: &Path, reason: impl Into<String>) -> ModMergeError {
        ModMergeError::ModResolution {
            id: definition.display().to_string(),
            reason: reason.into(),
        }
    }

    fn is_definition(path: &Path) -> bool {
        path.extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(DEFINITION_EXTENSION))
    }
}

impl ModProvider for FsModProvider {
    fn resolve_id(&self, id: &str) -> (PathBuf, ModKey) {
        let id = id.trim();
        let mut file = PathBuf::from(id);
        if !Self::is_definition(&file) {
            file = PathBuf::from(format!("{id}.{DEFINITION_EXTENSION}"));
        }
        if file.is_relative() {
            file = self.definitions_dir.join(file);
        }
        let file = fsutil::normalize_absolute(&file);
        let key = ModKey::from_path(&file);
        (file, key)
    }

    fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModMergeError> {
        let needle = query.trim().to_lowercase();
        let entries = fs::read_dir(&self.definitions_dir).map_err(|source| {
            ModMergeError::ReadFile {
                path: self.definitions_dir.clone(),
                source,
            }
        })?;

        let mut hits = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || !Self::is_definition(&path) {
                continue;
            }
            let Ok(text) = fs::read_to_string(&path) else {
                debug!(path = %path.display(), "skipping unreadable definition");
                continue;
            };
            let Some(name) = ModDescriptor::parse(&text).name else {
                continue;
            };
            if let Some(rank) = name.to_lowercase().find(&needle) {
                hits.push(SearchHit {
                    name,
                    definition: path,
                    rank,
                });
            }
        }
        hits.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        debug!(query, hits = hits.len(), "searched mod definitions");
        Ok(hits)
    }

    fn load(&self, definition: &Path) -> Result<Mod, ModMergeError> {
        let text = fs::read_to_string(definition)
            .map_err(|e| Self::resolution(definition, format!("cannot read definition file: {e}")))?;
        let desc = ModDescriptor::parse(&text);

        let requirement = desc.supported_version.as_deref().ok_or_else(|| {
            Self::resolution(definition, "the definition does not declare `supported_version`")
        })?;
        let version = Version::parse(requirement).map_err(|e| Self::resolution(definition, e.to_string()))?;

        let source = match (&desc.path, &desc.archive) {
            (Some(path), _) => self.mods_dir.join(path),
            (None, Some(archive)) => {
                return Err(Self::resolution(
                    definition,
                    format!(
                        "archive-packaged mods are not supported ('{archive}'); unpack it and set `path` to the folder"
                    ),
                ));
            }
            (None, None) => {
                return Err(Self::resolution(
                    definition,
                    "the definition declares neither `path` nor `archive`",
                ));
            }
        };
        if !source.is_dir() {
            return Err(Self::resolution(
                definition,
                format!("mod folder '{}' does not exist", source.display()),
            ));
        }

        fs::create_dir_all(&self.extract_root)?;
        let extracted = tempfile::Builder::new()
            .prefix("mod-")
            .tempdir_in(&self.extract_root)?;
        let copied = fsutil::copy_tree(&source, extracted.path(), |rel| !Self::is_definition(rel))?;

        if desc.name.is_none() {
            warn!(definition = %definition.display(), "mod does not have a name");
        }
        let loaded = Mod::new(
            desc.name,
            version,
            definition.to_path_buf(),
            extracted,
            &self.merge,
        )?;
        info!(
            name = loaded.name(),
            version = %loaded.version(),
            files = copied.len(),
            "mod extracted"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoadOrder, LoadOutcome};

    struct Fixture {
        _root: tempfile::TempDir,
        provider: FsModProvider,
        mods_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let mods_dir = root.path().join("Stellaris");
        fs::create_dir_all(mods_dir.join("mod")).unwrap();
        let paths = PathsConfig {
            mods_dir: mods_dir.clone(),
            ..PathsConfig::default()
        };
        Fixture {
            provider: FsModProvider::new(&paths, &MergeConfig::default(), root.path().join("tmp/mods")),
            _root: root,
            mods_dir,
        }
    }

    fn write_definition(mods_dir: &Path, file: &str, body: &str) -> PathBuf {
        let path = mods_dir.join("mod").join(file);
        fs::write(&path, body).unwrap();
        path
    }

    fn write_files(dir: &Path, files: &[&str]) {
        for rel in files {
            let p = dir.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, rel).unwrap();
        }
    }

    #[test]
    fn resolve_id_appends_extension_and_folder() {
        let fx = fixture();
        let (path, key) = fx.provider.resolve_id("UGC_42");
        assert_eq!(path, fx.mods_dir.join("mod/UGC_42.mod"));
        assert!(key.as_str().ends_with("/mod/ugc_42.mod"));

        let (same, same_key) = fx.provider.resolve_id("ugc_42.mod");
        assert_eq!(same, fx.mods_dir.join("mod/ugc_42.mod"));
        assert_eq!(key, same_key);

        let (abs, _) = fx.provider.resolve_id("/elsewhere/x.mod");
        assert_eq!(abs, Path::new("/elsewhere/x.mod"));
    }

    #[test]
    fn every_spelling_of_a_definition_gets_one_key() {
        let fx = fixture();
        let (canonical, key) = fx.provider.resolve_id("ugc_42");

        let dotted = fx.mods_dir.join("mod/../mod/./ugc_42.mod");
        let (path, dotted_key) = fx.provider.resolve_id(&dotted.to_string_lossy());
        assert_eq!(path, canonical);
        assert_eq!(dotted_key, key);

        let (_, nested_key) = fx.provider.resolve_id("./sub/../ugc_42");
        assert_eq!(nested_key, key);
    }

    #[test]
    fn same_definition_by_two_spellings_loads_once() {
        let fx = fixture();
        write_files(&fx.mods_dir.join("mod/ships"), &["common/ships.txt"]);
        let def = write_definition(
            &fx.mods_dir,
            "ships.mod",
            "name=\"Ships\"\npath=\"mod/ships\"\nsupported_version=\"1.0.0\"\n",
        );
        let dotted = fx.mods_dir.join("mod/./../mod/ships.mod");

        let mut lo = LoadOrder::new();
        assert!(lo.load(fx.provider.load(&def).unwrap()).is_loaded());
        let LoadOutcome::Duplicate(rejected) = lo.load(fx.provider.load(&dotted).unwrap()) else {
            panic!("second spelling was loaded again");
        };
        assert_eq!(rejected.key(), &ModKey::from_path(&def));
        rejected.release().unwrap();
        assert_eq!(lo.len(), 1);
    }

    #[test]
    fn search_ranks_by_match_position() {
        let fx = fixture();
        write_definition(&fx.mods_dir, "a.mod", "name=\"Ultimate Ships\"\n");
        write_definition(&fx.mods_dir, "b.mod", "name=\"Ships Expanded\"\n");
        write_definition(&fx.mods_dir, "c.mod", "name=\"Planets\"\n");
        write_definition(&fx.mods_dir, "d.mod", "supported_version=\"1.0\"\n");
        fs::write(fx.mods_dir.join("mod/notes.txt"), "name=\"Ships notes\"").unwrap();

        let hits = fx.provider.search("SHIPS").unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Ships Expanded", "Ultimate Ships"]);
        assert_eq!(hits[0].rank, 0);
    }

    #[test]
    fn load_extracts_loose_files_without_definitions() {
        let fx = fixture();
        write_files(
            &fx.mods_dir.join("mod/ships"),
            &["common/ships.txt", "gfx/ship.dds", "descriptor.mod"],
        );
        let def = write_definition(
            &fx.mods_dir,
            "ships.mod",
            "name=\"Ships\"\npath=\"mod/ships\"\nsupported_version=\"1.0.*\"\n",
        );

        let m = fx.provider.load(&def).unwrap();
        assert_eq!(m.name(), "Ships");
        assert_eq!(m.version(), &Version::new(vec![1, 0, 0]));
        assert_eq!(m.mergeable_files(), [PathBuf::from("common/ships.txt")]);
        assert_eq!(m.opaque_files(), [PathBuf::from("gfx/ship.dds")]);
        assert!(!m.root().join("descriptor.mod").exists());
        assert!(m.root().starts_with(fx.provider.extract_root.as_path()));
    }

    #[test]
    fn load_rejects_archives() {
        let fx = fixture();
        let def = write_definition(
            &fx.mods_dir,
            "zipped.mod",
            "name=\"Z\"\narchive=\"mod/z.zip\"\nsupported_version=\"1.0.0\"\n",
        );
        let err = fx.provider.load(&def).unwrap_err();
        assert!(matches!(err, ModMergeError::ModResolution { .. }));
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn load_rejects_incomplete_definitions() {
        let fx = fixture();
        let no_version = write_definition(&fx.mods_dir, "a.mod", "name=\"A\"\npath=\"mod/a\"\n");
        assert!(fx.provider.load(&no_version).unwrap_err().to_string().contains("supported_version"));

        let bad_version =
            write_definition(&fx.mods_dir, "b.mod", "path=\"mod/b\"\nsupported_version=\"one\"\n");
        assert!(matches!(
            fx.provider.load(&bad_version).unwrap_err(),
            ModMergeError::ModResolution { .. }
        ));

        let no_folder =
            write_definition(&fx.mods_dir, "c.mod", "path=\"mod/missing\"\nsupported_version=\"1.0\"\n");
        assert!(fx.provider.load(&no_folder).unwrap_err().to_string().contains("does not exist"));

        let missing = fx.mods_dir.join("mod/ghost.mod");
        assert!(matches!(
            fx.provider.load(&missing).unwrap_err(),
            ModMergeError::ModResolution { .. }
        ));
    }
}
