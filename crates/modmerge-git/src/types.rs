//! Core types for the modmerge substrate layer.
//!
//! These types form the vocabulary shared between the [`GitRepo`](crate::GitRepo)
//! trait and the compilation engine. They contain no process or CLI details;
//! the backend is an implementation detail.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// BranchName
// ---------------------------------------------------------------------------

/// A validated local branch name (the part after `refs/heads/`).
///
/// Only the subset of names the engine creates is accepted: ASCII letters,
/// digits, `.`, `_`, `-`, and `/` as a component separator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    /// Create a new `BranchName`, validating it.
    ///
    /// # Errors
    /// Returns an error if the name is empty, contains characters outside
    /// the accepted set, has empty or dot-leading components, or ends in
    /// `.lock`.
    pub fn new(name: &str) -> Result<Self, BranchNameError> {
        Self::validate(name)?;
        Ok(Self(name.to_owned()))
    }

    /// Return the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), BranchNameError> {
        let reject = |reason: &str| {
            Err(BranchNameError {
                value: name.to_owned(),
                reason: reason.to_owned(),
            })
        };
        if name.is_empty() {
            return reject("branch name must not be empty");
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/')))
        {
            return reject(&format!("invalid character '{bad}'"));
        }
        if name.starts_with('-') {
            return reject("branch name must not start with '-'");
        }
        if name.ends_with(".lock") {
            return reject("branch name must not end with '.lock'");
        }
        for component in name.split('/') {
            if component.is_empty() {
                return reject("branch name must not contain empty path components");
            }
            if component.starts_with('.') {
                return reject("path components must not start with '.'");
            }
        }
        if name.contains("..") {
            return reject("branch name must not contain '..'");
        }
        Ok(())
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BranchName {
    type Err = BranchNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error from validating a [`BranchName`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchNameError {
    /// The invalid value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for BranchNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid branch name {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for BranchNameError {}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Author/committer identity recorded on commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Signature {
    /// Create a new signature.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge types
// ---------------------------------------------------------------------------

/// One side of a two-parent merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The branch checked out when the merge started (HEAD).
    Ours,
    /// The branch being merged in.
    Theirs,
}

impl Side {
    /// The name git uses for this side in `-X` and `--ours`/`--theirs` flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit created automatically when a merge finishes without conflicts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoCommit {
    /// Commit message.
    pub message: String,
    /// Author and committer.
    pub author: Signature,
}

/// Options for [`GitRepo::merge`](crate::GitRepo::merge).
///
/// The default is a plain content-level three-way merge that stops before
/// committing, so the caller can inspect and resolve conflicts first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Side favored for conflicting hunks (`-X ours` / `-X theirs`).
    ///
    /// `None` leaves conflicting hunks as conflicts.
    pub favor: Option<Side>,
    /// Detect renames while merging.
    pub find_renames: bool,
    /// Permit merging branches that share no history.
    pub allow_unrelated_histories: bool,
    /// Commit automatically when the merge is clean. `None` stops before
    /// committing (`--no-commit`), conflicts or not.
    pub auto_commit: Option<AutoCommit>,
}

/// Result of a merge that ran to completion (possibly with conflicts).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Paths the merge could not resolve on its own.
    pub conflicts: Vec<Conflict>,
    /// `true` if the merge created a commit.
    pub committed: bool,
}

impl MergeOutcome {
    /// Returns `true` if every path merged cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// An unresolved path left in the index after a merge.
///
/// The three flags record which index stages are present: the merge base
/// (stage 1), our side (stage 2), and their side (stage 3). A missing side
/// means that side deleted (or never had) the path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conflict {
    /// Path relative to the working-copy root.
    pub path: PathBuf,
    /// Stage 1 (common ancestor) present.
    pub base: bool,
    /// Stage 2 (HEAD) present.
    pub ours: bool,
    /// Stage 3 (merged branch) present.
    pub theirs: bool,
}

impl Conflict {
    /// Returns `true` if `side` still has content at this path.
    #[must_use]
    pub const fn has(&self, side: Side) -> bool {
        match side {
            Side::Ours => self.ours,
            Side::Theirs => self.theirs,
        }
    }

    /// Short description in `git status` vocabulary.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match (self.base, self.ours, self.theirs) {
            (_, true, true) if !self.base => "both added",
            (_, true, true) => "both modified",
            (_, true, false) => "deleted by them",
            (_, false, true) => "deleted by us",
            (_, false, false) => "both deleted",
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.describe())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
