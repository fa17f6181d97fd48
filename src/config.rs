//! modmerge configuration (`modmerge.toml`).
//!
//! Every setting has a default, so the file is optional. Relative paths are
//! taken relative to the working directory the tool runs in.

use std::fmt;
use std::path::{Path, PathBuf};

use modmerge_git::Signature;
use serde::Deserialize;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "modmerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModMergeConfig {
    /// Where inputs, scratch space, and outputs live.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Commit identity and merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// The tab-indented list of known base versions.
    #[serde(default = "default_versions_file")]
    pub versions_file: PathBuf,

    /// Git repository holding one `core/v<M.m.p>` branch per base version.
    #[serde(default = "default_snapshots")]
    pub snapshots: PathBuf,

    /// Compiled mods are written to `<output>/<target>`.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Scratch root. Each process extracts mods and clones working copies
    /// into its own `run-<pid>` directory here and removes only that.
    #[serde(default = "default_temp")]
    pub temp: PathBuf,

    /// The game's user directory; mod definitions live in `<mods_dir>/mod`.
    #[serde(default = "default_mods_dir")]
    pub mods_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            versions_file: default_versions_file(),
            snapshots: default_snapshots(),
            output: default_output(),
            temp: default_temp(),
            mods_dir: default_mods_dir(),
        }
    }
}

impl PathsConfig {
    /// Directory scanned for `.mod` definition files.
    #[must_use]
    pub fn definitions_dir(&self) -> PathBuf {
        self.mods_dir.join("mod")
    }
}

fn default_versions_file() -> PathBuf {
    PathBuf::from("resources/versions.txt")
}

fn default_snapshots() -> PathBuf {
    PathBuf::from("resources/snapshots")
}

fn default_output() -> PathBuf {
    PathBuf::from("out")
}

fn default_temp() -> PathBuf {
    PathBuf::from(".modmerge-tmp")
}

fn default_mods_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("Paradox Interactive")
        .join("Stellaris")
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Author recorded on session commits.
    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Extensions (without the dot) merged line by line. Every other file
    /// is replaced whole when two sides disagree.
    #[serde(default = "default_mergeable_extensions")]
    pub mergeable_extensions: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
            mergeable_extensions: default_mergeable_extensions(),
        }
    }
}

impl MergeConfig {
    /// Commit identity for session commits.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::new(&self.author_name, &self.author_email)
    }

    /// `true` if `path` has one of the mergeable extensions
    /// (case-insensitive).
    #[must_use]
    pub fn is_mergeable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.mergeable_extensions
                    .iter()
                    .any(|m| m.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

fn default_author_name() -> String {
    "modmerge".to_owned()
}

fn default_author_email() -> String {
    "modmerge@localhost".to_owned()
}

fn default_mergeable_extensions() -> Vec<String> {
    [
        "txt", "yml", "asset", "fnt", "shader", "gfx", "gui", "py", "sh", "vdf",
    ]
    .map(str::to_owned)
    .to_vec()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl ModMergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}
