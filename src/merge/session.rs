//! One compilation session: a private working copy of the snapshot
//! repository and the branches created in it.
//!
//! Branch layout inside a session (numbers come from one counter, so every
//! name is unique within the session):
//!
//! ```text
//! core/v1.0.0 ──┬── mod/0001            (first mod's files)
//!               ├── mod/0002
//!               └── merge/0003-v1.0.0   (mods folded, then core/v1.0.1 merged)
//!                     ├── mod/0004
//!                     └── final/0005    (pending mods folded; materialized)
//! ```
//!
//! The working copy is deleted when the session is finalized or dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use modmerge_git::{BranchName, GitError, GitRepo, MergeOptions, Side, Signature, Substrate};
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use super::overlap;
use super::policy;
use crate::error::ModMergeError;
use crate::fsutil;
use crate::model::Mod;
use crate::registry::BaseVersion;
use crate::version::Version;

/// Where a session is in its lifecycle. Logged at every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    SessionOpen,
    Branching,
    Applying,
    Merged,
    MergingMods,
    MergingBase,
    Resolving,
    Finalized,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SessionOpen => "session-open",
            Self::Branching => "branching",
            Self::Applying => "applying",
            Self::Merged => "merged",
            Self::MergingMods => "merging-mods",
            Self::MergingBase => "merging-base",
            Self::Resolving => "resolving",
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Snapshot branch for a base version: `core/v1.0.1`.
///
/// # Errors
/// Never for versions built from integers; the name is still validated.
pub fn core_branch(base: BaseVersion) -> Result<BranchName, GitError> {
    Ok(BranchName::new(&format!("core/{base}"))?)
}

/// Record of one base-version upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Upgrade {
    pub from: Version,
    pub to: Version,
    pub branch: String,
    /// Conflicted paths resolved to the mod side.
    pub kept_mod: Vec<PathBuf>,
    /// Conflicted paths resolved to the new snapshot.
    pub took_snapshot: Vec<PathBuf>,
}

/// A working copy plus the engine's position in it.
pub struct Session<R: GitRepo> {
    repo: R,
    dir: Option<TempDir>,
    author: Signature,
    counter: u32,
    base: BaseVersion,
    context: BranchName,
    pending: Vec<BranchName>,
    state: SessionState,
}

impl<R: GitRepo> Session<R> {
    /// Clone the snapshot repository into a fresh directory under
    /// `work_root` and check out the snapshot for `base`.
    ///
    /// # Errors
    /// Fails if the working copy cannot be created or the snapshot branch
    /// does not exist. Nothing is left on disk on failure.
    #[instrument(skip_all, fields(base = %base))]
    pub fn open<S>(
        substrate: &S,
        work_root: &Path,
        base: BaseVersion,
        author: Signature,
        mergeable_extensions: &[String],
    ) -> Result<Self, ModMergeError>
    where
        S: Substrate<Repo = R>,
    {
        fs::create_dir_all(work_root)?;
        let dir = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(work_root)?;
        let repo = substrate.open_working_copy(dir.path())?;
        let context = core_branch(base)?;
        repo.set_identity(&author)?;
        repo.checkout(&context)?;
        repo.write_merge_attributes(mergeable_extensions)?;

        let session = Self {
            repo,
            dir: Some(dir),
            author,
            counter: 0,
            base,
            context,
            pending: Vec::new(),
            state: SessionState::SessionOpen,
        };
        info!(workdir = %session.workdir().display(), "session opened");
        Ok(session)
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        self.repo.workdir()
    }

    /// The snapshot the current point is based on.
    #[must_use]
    pub const fn base(&self) -> BaseVersion {
        self.base
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Branch new mod branches are created from.
    #[must_use]
    pub const fn context(&self) -> &BranchName {
        &self.context
    }

    /// Mod branches not yet folded into the current point.
    #[must_use]
    pub fn pending(&self) -> &[BranchName] {
        &self.pending
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn next_branch(&mut self, kind: &str, suffix: Option<&str>) -> Result<BranchName, GitError> {
        self.counter += 1;
        let name = match suffix {
            Some(s) => format!("{kind}/{:04}-{s}", self.counter),
            None => format!("{kind}/{:04}", self.counter),
        };
        Ok(BranchName::new(&name)?)
    }

    /// Merge every pending mod branch into HEAD, later branches winning,
    /// committing after each.
    fn fold_pending(&mut self) -> Result<usize, ModMergeError> {
        let pending = std::mem::take(&mut self.pending);
        let options = MergeOptions {
            favor: Some(policy::FOLD_SIDE),
            ..MergeOptions::default()
        };
        for branch in &pending {
            let outcome = self.repo.merge(branch, &options)?;
            for conflict in &outcome.conflicts {
                debug!(%conflict, "resolving in favor of later mod");
                self.repo.resolve_conflict(conflict, policy::FOLD_SIDE)?;
            }
            self.repo.commit(&format!("fold {branch}"), &self.author)?;
        }
        Ok(pending.len())
    }

    /// Move the current point to snapshot `to`, carrying pending mods along.
    ///
    /// # Errors
    /// Fails on any substrate error.
    #[instrument(skip_all, fields(from = %self.base, to = %to))]
    pub fn upgrade(&mut self, to: BaseVersion) -> Result<Upgrade, ModMergeError> {
        let from = self.base;
        let old_core = core_branch(from)?;
        let new_core = core_branch(to)?;

        self.transition(SessionState::MergingMods);
        let branch = self.next_branch("merge", Some(&from.to_string()))?;
        self.repo.create_branch(&branch)?;
        self.repo.checkout(&branch)?;
        let folded = self.fold_pending()?;

        self.transition(SessionState::MergingBase);
        let touched: BTreeSet<PathBuf> = self.repo.changed_paths(&old_core)?;
        let outcome = self.repo.merge(
            &new_core,
            &MergeOptions {
                favor: None,
                find_renames: true,
                allow_unrelated_histories: true,
                auto_commit: None,
            },
        )?;

        self.transition(SessionState::Resolving);
        let mut kept_mod = Vec::new();
        let mut took_snapshot = Vec::new();
        for conflict in &outcome.conflicts {
            let side = policy::upgrade_side(&conflict.path, &touched);
            debug!(%conflict, %side, "resolving upgrade conflict");
            self.repo.resolve_conflict(conflict, side)?;
            match side {
                Side::Ours => kept_mod.push(conflict.path.clone()),
                Side::Theirs => took_snapshot.push(conflict.path.clone()),
            }
        }
        self.repo
            .commit(&format!("upgrade base {from} -> {to}"), &self.author)?;

        self.context = branch.clone();
        self.base = to;
        self.transition(SessionState::Merged);
        info!(
            branch = %branch,
            folded,
            conflicts = outcome.conflicts.len(),
            "base upgraded"
        );
        Ok(Upgrade {
            from: from.into(),
            to: to.into(),
            branch: branch.to_string(),
            kept_mod,
            took_snapshot,
        })
    }

    /// Files of `m` that already exist at the current point.
    ///
    /// # Errors
    /// Fails if either tree cannot be listed.
    pub fn overlaps(&self, m: &Mod) -> Result<Vec<PathBuf>, ModMergeError> {
        Ok(overlap::find_overlaps(self.workdir(), m.root())?)
    }

    /// Commit `m`'s files on a new branch off the current point and record
    /// the branch as pending.
    ///
    /// # Errors
    /// Fails on copy or substrate errors.
    #[instrument(skip_all, fields(name = m.name(), version = %m.version()))]
    pub fn apply_mod(&mut self, m: &Mod) -> Result<BranchName, ModMergeError> {
        self.transition(SessionState::Branching);
        let branch = self.next_branch("mod", None)?;
        self.repo.create_branch(&branch)?;
        self.repo.checkout(&branch)?;

        self.transition(SessionState::Applying);
        let copied = fsutil::copy_tree(m.root(), self.repo.workdir(), |_| true)?;
        self.repo.stage_all()?;
        self.repo.commit(
            &format!("apply mod {} ({})", m.name(), m.version()),
            &self.author,
        )?;
        self.repo.checkout(&self.context)?;

        self.pending.push(branch.clone());
        self.transition(SessionState::Merged);
        debug!(branch = %branch, files = copied.len(), "mod applied");
        Ok(branch)
    }

    /// Fold the pending mods onto a final branch, copy the result to a
    /// fresh directory `<output_root>/<name>` (suffixed `-N` when taken),
    /// and delete the working copy.
    ///
    /// # Errors
    /// Fails on substrate or copy errors; the working copy is deleted
    /// either way.
    #[instrument(skip(self, output_root))]
    pub fn finalize(mut self, output_root: &Path, name: &str) -> Result<PathBuf, ModMergeError> {
        self.transition(SessionState::MergingMods);
        let branch = self.next_branch("final", None)?;
        self.repo.create_branch(&branch)?;
        self.repo.checkout(&branch)?;
        let folded = self.fold_pending()?;

        let output = fsutil::fresh_dir(output_root, name)?;
        fsutil::copy_tree(self.repo.workdir(), &output, |_| true)?;

        self.transition(SessionState::Finalized);
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        info!(branch = %branch, folded, output = %output.display(), "session finalized");
        Ok(output)
    }

    /// Delete the working copy without producing any output.
    ///
    /// # Errors
    /// Fails if the directory cannot be removed.
    pub fn discard(mut self) -> Result<(), ModMergeError> {
        self.transition(SessionState::Aborted);
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

impl<R: GitRepo> Drop for Session<R> {
    fn drop(&mut self) {
        if !matches!(self.state, SessionState::Finalized | SessionState::Aborted) {
            warn!(state = %self.state, "session aborted; discarding working copy");
            self.state = SessionState::Aborted;
        }
    }
}
