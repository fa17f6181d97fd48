//! The base-version registry.
//!
//! The versions file lists every base-game snapshot that exists, one integer
//! per line, with leading tabs giving the level:
//!
//! ```text
//! 1           // main
//! 	0       // major
//! 		0   // minor
//! 		1
//! 2
//! 	0
//! 		0
//! ```
//!
//! The registry is always exactly three levels deep, so it is stored as a
//! flat ordered set of `(main, major, minor)` triples. Prefix existence is a
//! range query over that set.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ModMergeError;
use crate::version::Version;

/// Deepest indentation level (minor versions).
const MAX_DEPTH: usize = 2;

// ---------------------------------------------------------------------------
// BaseVersion
// ---------------------------------------------------------------------------

/// One concrete snapshot: `main.major.minor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseVersion {
    pub main: u32,
    pub major: u32,
    pub minor: u32,
}

impl From<BaseVersion> for Version {
    fn from(b: BaseVersion) -> Self {
        Self::new(vec![b.main, b.major, b.minor])
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.main, self.major, self.minor)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A malformed versions file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatError {
    /// 1-based line number the problem was detected at.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for FormatError {}

/// Which part of a version failed to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VersionComponent {
    /// Not a version string at all.
    Syntax,
    Main,
    Major,
    Minor,
}

impl VersionComponent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Main => "main",
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

/// A version string that does not name a known base version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownVersion {
    /// The text as given (or the rendered requirement of a mod).
    pub input: String,
    pub component: VersionComponent,
}

impl fmt::Display for UnknownVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.input.trim().trim_start_matches(['v', 'V']);
        match self.component {
            VersionComponent::Syntax => write!(f, "v{shown} is not a valid version string"),
            other => write!(f, "v{shown}: no such {} version exists", other.as_str()),
        }
    }
}

impl std::error::Error for UnknownVersion {}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every base version a snapshot exists for. Never empty once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registry {
    versions: BTreeSet<BaseVersion>,
}

impl Registry {
    /// Parse the versions file format.
    ///
    /// # Errors
    /// Returns a [`FormatError`] carrying the offending line for: an
    /// indentation increase of more than one level (including an indented
    /// first entry), a main or major entry without children, nesting deeper
    /// than minor versions, a value that is not a non-negative integer, a
    /// duplicate entry, or a file that lists nothing.
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let fail = |line: usize, message: String| Err(FormatError { line, message });

        let mut versions = BTreeSet::new();
        let mut mains = BTreeSet::new();
        let mut majors = BTreeSet::new();
        let mut main = 0;
        let mut major = 0;
        // (depth, line, value) of the previous entry
        let mut prev: Option<(usize, usize, u32)> = None;

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let content = raw.split("//").next().unwrap_or_default().trim_end();
            let body = content.trim_start_matches('\t');
            let depth = content.len() - body.len();
            if body.trim().is_empty() {
                continue;
            }

            match prev {
                None if depth > 0 => {
                    return fail(line, "the first entry must not be indented".to_owned());
                }
                Some((prev_depth, ..)) if depth > prev_depth + 1 => {
                    return fail(
                        line,
                        format!(
                            "indentation may increase by one level at a time (from {prev_depth} to {depth})"
                        ),
                    );
                }
                Some((prev_depth, prev_line, prev_value))
                    if prev_depth < MAX_DEPTH && depth != prev_depth + 1 =>
                {
                    return fail(
                        prev_line,
                        format!("entry {prev_value} must list sub-versions on the lines below it"),
                    );
                }
                _ => {}
            }
            if depth > MAX_DEPTH {
                return fail(
                    line,
                    format!("indentation cannot exceed {MAX_DEPTH} levels"),
                );
            }

            let text = body.trim();
            let Ok(value) = text.parse::<u32>() else {
                return fail(line, format!("'{text}' is not a non-negative integer"));
            };
            let fresh = match depth {
                0 => {
                    main = value;
                    mains.insert(main)
                }
                1 => {
                    major = value;
                    majors.insert((main, major))
                }
                _ => versions.insert(BaseVersion {
                    main,
                    major,
                    minor: value,
                }),
            };
            if !fresh {
                return fail(line, format!("duplicate entry {value}"));
            }
            prev = Some((depth, line, value));
        }

        match prev {
            None => fail(1, "no versions are listed".to_owned()),
            Some((depth, line, value)) if depth < MAX_DEPTH => fail(
                line,
                format!("entry {value} must list sub-versions on the lines below it"),
            ),
            Some(_) => Ok(Self { versions }),
        }
    }

    /// Check `version` level by level, reporting the first level that is
    /// missing. Versions deeper than three levels fail as [`VersionComponent::Syntax`].
    ///
    /// # Errors
    /// Returns the component that does not exist.
    pub fn check(&self, version: &Version) -> Result<(), VersionComponent> {
        let c = version.components();
        if c.is_empty() || c.len() > 3 {
            return Err(VersionComponent::Syntax);
        }
        let levels = [
            (VersionComponent::Main, &c[..1]),
            (VersionComponent::Major, c.get(..2).unwrap_or(&[])),
            (VersionComponent::Minor, c.get(..3).unwrap_or(&[])),
        ];
        for (component, prefix) in levels {
            if prefix.is_empty() {
                break;
            }
            if self.range(prefix).next().is_none() {
                return Err(component);
            }
        }
        Ok(())
    }

    /// `true` if a snapshot exists under `version`, checking exactly as many
    /// levels as it has components.
    #[must_use]
    pub fn exists(&self, version: &Version) -> bool {
        self.check(version).is_ok()
    }

    /// The newest snapshot, always three components.
    #[must_use]
    pub fn latest(&self) -> Version {
        self.versions
            .last()
            .copied()
            .map_or_else(|| Version::new(Vec::new()), Version::from)
    }

    /// The concrete snapshot a version names: itself when fully specified,
    /// otherwise the newest snapshot under the prefix.
    #[must_use]
    pub fn resolve_snapshot(&self, version: &Version) -> Option<BaseVersion> {
        if !self.exists(version) {
            return None;
        }
        self.range(version.components()).next_back().copied()
    }

    /// Parse and check a user-supplied target version (`M.m` or `M.m.p`,
    /// optional leading `v`).
    ///
    /// # Errors
    /// Returns [`UnknownVersion`] naming the first component that failed.
    pub fn validate_version_string(&self, text: &str) -> Result<Version, UnknownVersion> {
        static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?$").expect("static regex must compile")
        });

        let unknown = |component| UnknownVersion {
            input: text.to_owned(),
            component,
        };
        let lowered = text.trim().to_lowercase();
        let body = lowered.strip_prefix('v').unwrap_or(&lowered);
        let caps = VERSION_RE
            .captures(body)
            .ok_or_else(|| unknown(VersionComponent::Syntax))?;
        let components = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| unknown(VersionComponent::Syntax))?;

        let version = Version::new(components);
        self.check(&version).map_err(unknown)?;
        Ok(version)
    }

    /// All snapshots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &BaseVersion> {
        self.versions.iter()
    }

    /// Number of snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn range(&self, prefix: &[u32]) -> std::collections::btree_set::Range<'_, BaseVersion> {
        let at = |i: usize, fill: u32| prefix.get(i).copied().unwrap_or(fill);
        let lo = BaseVersion {
            main: at(0, 0),
            major: at(1, 0),
            minor: at(2, 0),
        };
        let hi = BaseVersion {
            main: at(0, u32::MAX),
            major: at(1, u32::MAX),
            minor: at(2, u32::MAX),
        };
        self.versions.range(lo..=hi)
    }
}

// ---------------------------------------------------------------------------
// RegistryLoader
// ---------------------------------------------------------------------------

/// Reads the versions file on first use and keeps the result.
///
/// A failed parse is returned to the caller and not remembered; the next
/// call reads the file again.
#[derive(Debug)]
pub struct RegistryLoader {
    path: PathBuf,
    cached: Option<Registry>,
}

impl RegistryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    /// Wrap an already-parsed registry.
    #[must_use]
    pub fn preloaded(path: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            path: path.into(),
            cached: Some(registry),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` once a parse has succeeded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// The registry, parsing the file if needed.
    ///
    /// # Errors
    /// [`ModMergeError::ReadFile`] if the file cannot be read,
    /// [`ModMergeError::ConfigFormat`] if it is malformed.
    pub fn get(&mut self) -> Result<&Registry, ModMergeError> {
        let registry = match self.cached.take() {
            Some(registry) => registry,
            None => {
                let source =
                    fs::read_to_string(&self.path).map_err(|source| ModMergeError::ReadFile {
                        path: self.path.clone(),
                        source,
                    })?;
                let registry =
                    Registry::parse(&source).map_err(|e| ModMergeError::ConfigFormat {
                        path: self.path.clone(),
                        line: e.line,
                        message: e.message,
                    })?;
                debug!(
                    path = %self.path.display(),
                    versions = registry.len(),
                    "loaded version registry"
                );
                registry
            }
        };
        Ok(self.cached.insert(registry))
    }
}
