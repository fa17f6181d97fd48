//! Error types for modmerge.
//!
//! Defines [`ModMergeError`], the error type for every engine operation.
//! Each message says what went wrong, names the offending mod, version, or
//! path, and ends with a "To fix:" hint.

use std::fmt;
use std::path::PathBuf;

use modmerge_git::GitError;

use crate::config::ConfigError;
use crate::registry::{UnknownVersion, VersionComponent};
use crate::version::Version;

/// Unified error type for modmerge operations.
#[derive(Debug)]
pub enum ModMergeError {
    /// The versions file is malformed. Never cached; the next use re-reads
    /// the file.
    ConfigFormat {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        message: String,
    },

    /// A version string does not name a known base version.
    UnknownVersion {
        /// The version as given or required.
        version: String,
        /// Which level failed to resolve.
        component: VersionComponent,
        /// Display name of the mod requiring it, if any.
        required_by: Option<String>,
    },

    /// Compilation was requested with an empty load order.
    NoModsLoaded,

    /// Every loaded mod requires a base version newer than the target.
    AllModsSkipped {
        target: Version,
        /// How many mods were skipped.
        skipped: usize,
    },

    /// A mod could not be found, read, or extracted. Nothing was registered.
    ModResolution {
        /// The id, path, or search text the user gave.
        id: String,
        reason: String,
    },

    /// The version-control substrate failed. The session working copy has
    /// already been removed.
    Substrate(GitError),

    /// `modmerge.toml` is malformed.
    Config(ConfigError),

    /// A required file could not be read.
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Any other I/O error (copying trees, creating scratch directories).
    Io(std::io::Error),
}

impl ModMergeError {
    /// Attach the requiring mod to an [`UnknownVersion`] error.
    #[must_use]
    pub fn unknown_version_for(err: UnknownVersion, mod_name: &str) -> Self {
        Self::UnknownVersion {
            version: err.input,
            component: err.component,
            required_by: Some(mod_name.to_owned()),
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::ConfigFormat { .. } | Self::ReadFile { .. } => 3,
            Self::Substrate(_) | Self::Io(_) => 4,
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for ModMergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigFormat {
                path,
                line,
                message,
            } => {
                write!(
                    f,
                    "malformed versions file '{}' (line {line}): {message}\n  To fix: one integer per line, one tab per level (main, major, minor); `//` starts a comment.",
                    path.display()
                )
            }
            Self::UnknownVersion {
                version,
                component,
                required_by,
            } => {
                let shown = version.trim().trim_start_matches(['v', 'V']);
                match component {
                    VersionComponent::Syntax => {
                        write!(f, "v{shown} is not a valid version string")?;
                    }
                    other => {
                        write!(f, "v{shown}: no such {} version exists", other.as_str())?;
                    }
                }
                if let Some(name) = required_by {
                    write!(f, " (required by mod '{name}')")?;
                }
                write!(
                    f,
                    "\n  To fix: pick a version listed by:\n    modmerge versions"
                )
            }
            Self::NoModsLoaded => {
                write!(
                    f,
                    "no mods are loaded.\n  To fix: load at least one mod first:\n    load <mod-file>"
                )
            }
            Self::AllModsSkipped { target, skipped } => {
                write!(
                    f,
                    "all {skipped} loaded mod(s) require a base version newer than {target}.\n  To fix: compile against a newer version with -t, or unload those mods."
                )
            }
            Self::ModResolution { id, reason } => {
                write!(
                    f,
                    "mod '{id}' was not loaded: {reason}\n  To fix: check the mod definition file, or find it with:\n    modmerge search <name>"
                )
            }
            Self::Substrate(err) => {
                write!(
                    f,
                    "version control failed: {err}\n  To fix: check that the snapshot repository is intact and `git` is on PATH."
                )
            }
            Self::Config(err) => {
                write!(
                    f,
                    "configuration error: {err}\n  To fix: edit the config file and correct the issue."
                )
            }
            Self::ReadFile { path, source } => {
                write!(
                    f,
                    "cannot read '{}': {source}\n  To fix: check that the file exists, or point the config at it.",
                    path.display()
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

impl std::error::Error for ModMergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Substrate(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::ReadFile { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for ModMergeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GitError> for ModMergeError {
    fn from(err: GitError) -> Self {
        Self::Substrate(err)
    }
}

impl From<ConfigError> for ModMergeError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<UnknownVersion> for ModMergeError {
    fn from(err: UnknownVersion) -> Self {
        Self::UnknownVersion {
            version: err.input,
            component: err.component,
            required_by: None,
        }
    }
}

impl From<walkdir::Error> for ModMergeError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.into())
    }
}
