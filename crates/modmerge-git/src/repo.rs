//! The [`GitRepo`] trait, the abstraction boundary between the compilation
//! engine and version control.
//!
//! The engine consumes exactly these primitives and never inspects
//! substrate-internal state beyond the branch names it created itself.
//!
//! | Group     | Methods                                                  |
//! |-----------|----------------------------------------------------------|
//! | Branches  | `current_branch`, `branch_exists`, `create_branch`, `checkout` |
//! | Commits   | `stage_all`, `commit`                                    |
//! | Merging   | `merge`, `conflicts`, `resolve_conflict`                 |
//! | Inspection| `changed_paths`                                          |
//! | Setup     | `set_identity`, `write_merge_attributes`                 |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::types::{BranchName, Conflict, MergeOptions, MergeOutcome, Side, Signature};

/// A checked-out working copy the engine can branch, commit, and merge in.
///
/// All operations block and act on the single working tree rooted at
/// [`workdir`](Self::workdir); callers must sequence them. The trait is
/// object-safe so callers may use `&dyn GitRepo`.
pub trait GitRepo {
    /// Root directory of the working tree.
    fn workdir(&self) -> &Path;

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// The branch HEAD points at, or `None` when HEAD is detached.
    ///
    /// Replaces: `git symbolic-ref --short HEAD`.
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// Returns `true` if a local branch with this name exists.
    ///
    /// Replaces: `git rev-parse --verify refs/heads/<name>`.
    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError>;

    /// Create a branch at the current HEAD without switching to it.
    ///
    /// Replaces: `git branch <name>`.
    fn create_branch(&self, name: &BranchName) -> Result<(), GitError>;

    /// Switch the working tree to `name`, discarding tracked modifications.
    ///
    /// Replaces: `git checkout -f <name>`.
    fn checkout(&self, name: &BranchName) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Stage every addition, modification, and deletion in the working tree.
    ///
    /// Replaces: `git add -A`.
    fn stage_all(&self) -> Result<(), GitError>;

    /// Commit the index. Empty commits are allowed; an in-progress merge is
    /// concluded by this commit.
    ///
    /// Replaces: `git commit --allow-empty -m <message>`.
    fn commit(&self, message: &str, author: &Signature) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Merge `branch` into HEAD.
    ///
    /// File conflicts are not an error: they are returned in the
    /// [`MergeOutcome`] and left in the index for
    /// [`resolve_conflict`](Self::resolve_conflict). Any other failure
    /// (unknown branch, refused merge) is [`GitError::MergeFailed`].
    ///
    /// Replaces: `git merge --no-ff [--no-commit] [-X <side>] <branch>`.
    fn merge(&self, branch: &BranchName, options: &MergeOptions) -> Result<MergeOutcome, GitError>;

    /// Paths left unresolved in the index, sorted by path.
    ///
    /// Replaces: `git ls-files -u`.
    fn conflicts(&self) -> Result<Vec<Conflict>, GitError>;

    /// Resolve one conflicted path in favor of `side` and stage the result.
    ///
    /// When all three stages exist the file is re-merged hunk by hunk,
    /// taking `side` only for conflicting hunks; otherwise the whole file of
    /// `side` is taken, or the path is removed if `side` deleted it.
    fn resolve_conflict(&self, conflict: &Conflict, side: Side) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Paths whose content differs between `from` and HEAD.
    ///
    /// Replaces: `git diff --name-only <from> HEAD`.
    fn changed_paths(&self, from: &BranchName) -> Result<BTreeSet<PathBuf>, GitError>;

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Record `who` as the committer for every later commit and merge in
    /// this working copy, including merges that stop before committing.
    ///
    /// Replaces: `git config user.name <name>` and `git config user.email <email>`.
    fn set_identity(&self, who: &Signature) -> Result<(), GitError>;

    /// Declare which files may be merged as text. Every other file is
    /// treated as binary: conflicting edits to it are resolved whole-file.
    ///
    /// `mergeable_extensions` are bare extensions without the dot
    /// (e.g. `"txt"`). The attributes are private to this working copy.
    fn write_merge_attributes(&self, mergeable_extensions: &[String]) -> Result<(), GitError>;
}

/// A source of fresh working copies.
///
/// Each call clones the snapshot repository, with all of its branches, into
/// `dest` (which must exist and be empty) and returns a handle to it.
pub trait Substrate {
    /// The working-copy handle type.
    type Repo: GitRepo;

    /// Clone the snapshot repository into `dest`.
    fn open_working_copy(&self, dest: &Path) -> Result<Self::Repo, GitError>;
}
