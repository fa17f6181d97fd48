//! Error types for substrate operations.
//!
//! [`GitError`] is the single error type returned by all
//! [`GitRepo`](crate::GitRepo) trait methods. Variants are specific enough
//! that callers can tell a missing branch from a failed merge without parsing
//! error messages.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::BranchNameError;

/// Errors returned by [`GitRepo`](crate::GitRepo) and
/// [`Substrate`](crate::Substrate) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested branch or path was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A git invocation exited unsuccessfully.
    #[error("`{command}` failed (exit code {exit_code:?}): {stderr}")]
    Command {
        /// The command line that was run (e.g. `"git checkout -q -f core/v1.0.0"`).
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// Process exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
    },

    /// A merge stopped for a reason other than file conflicts
    /// (unrelated histories refused, dirty tree, unknown branch, ...).
    #[error("merge of `{branch}` failed: {message}")]
    MergeFailed {
        /// The branch being merged into HEAD.
        branch: String,
        /// Details reported by git.
        message: String,
    },

    /// The working copy could not be created at the requested location.
    #[error("cannot open working copy at {}: {message}", path.display())]
    WorkingCopy {
        /// Destination directory of the working copy.
        path: PathBuf,
        /// Why it failed.
        message: String,
    },

    /// A branch name was rejected before reaching git.
    #[error(transparent)]
    InvalidBranchName(#[from] BranchNameError),

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
