//! The git CLI-backed implementation of [`GitRepo`] and [`Substrate`].
//!
//! Every operation spawns the `git` executable with a fixed set of `-c`
//! overrides and with the global and system config files disabled, so the
//! user's configuration cannot change merge results. The committer identity
//! comes from the working copy's own config ([`GitRepo::set_identity`]).

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::GitError;
use crate::repo::{GitRepo, Substrate};
use crate::types::{BranchName, Conflict, MergeOptions, MergeOutcome, Side, Signature};

/// Configuration forced on every invocation.
const BASE_CONFIG: &[&str] = &[
    "-c",
    "core.autocrlf=false",
    "-c",
    "core.quotepath=false",
    "-c",
    "commit.gpgsign=false",
    "-c",
    "merge.conflictStyle=merge",
];

/// Identity variables that would override the working copy's config.
const IDENTITY_ENV: &[&str] = &[
    "GIT_AUTHOR_NAME",
    "GIT_AUTHOR_EMAIL",
    "GIT_COMMITTER_NAME",
    "GIT_COMMITTER_EMAIL",
];

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

// ---------------------------------------------------------------------------
// Process helpers
// ---------------------------------------------------------------------------

fn render<S: AsRef<OsStr>>(args: &[S]) -> String {
    let parts: Vec<_> = args
        .iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect();
    format!("git {}", parts.join(" "))
}

/// Run git and return its raw output, whatever the exit status.
fn run_git<S: AsRef<OsStr>>(dir: Option<&Path>, args: &[S]) -> Result<Output, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(BASE_CONFIG)
        .args(args)
        .env("LC_ALL", "C")
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", NULL_DEVICE);
    for var in IDENTITY_ENV {
        cmd.env_remove(var);
    }
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    debug!(command = %render(args), "running git");
    Ok(cmd.output()?)
}

/// Turn a non-zero exit status into [`GitError::Command`].
fn check<S: AsRef<OsStr>>(args: &[S], output: Output) -> Result<Output, GitError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(GitError::Command {
            command: render(args),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        })
    }
}

fn identity_args(author: &Signature) -> [String; 4] {
    [
        "-c".to_owned(),
        format!("user.name={}", author.name),
        "-c".to_owned(),
        format!("user.email={}", author.email),
    ]
}

// ---------------------------------------------------------------------------
// GitCli: the substrate
// ---------------------------------------------------------------------------

/// Opens working copies by cloning a snapshot repository.
///
/// The snapshot repository holds one branch per base-game version; the clone
/// carries every branch over as a local branch.
#[derive(Clone, Debug)]
pub struct GitCli {
    snapshots: PathBuf,
}

impl GitCli {
    /// Create a substrate over the snapshot repository at `snapshots`.
    pub fn new(snapshots: impl Into<PathBuf>) -> Self {
        Self {
            snapshots: snapshots.into(),
        }
    }

    /// Path of the snapshot repository.
    #[must_use]
    pub fn snapshots(&self) -> &Path {
        &self.snapshots
    }
}

impl Substrate for GitCli {
    type Repo = CliRepo;

    fn open_working_copy(&self, dest: &Path) -> Result<CliRepo, GitError> {
        if !self.snapshots.is_dir() {
            return Err(GitError::NotFound {
                message: format!("snapshot repository {}", self.snapshots.display()),
            });
        }
        if fs::read_dir(dest)?.next().is_some() {
            return Err(GitError::WorkingCopy {
                path: dest.to_owned(),
                message: "destination is not empty".to_owned(),
            });
        }

        // A bare clone maps refs/heads/* one-to-one, which a normal clone
        // would turn into remote-tracking branches.
        let git_dir = dest.join(".git");
        let clone = [
            OsStr::new("clone"),
            OsStr::new("--bare"),
            OsStr::new("-q"),
            self.snapshots.as_os_str(),
            git_dir.as_os_str(),
        ];
        check(&clone, run_git(None, &clone)?)?;

        let unbare = [
            OsStr::new("--git-dir"),
            git_dir.as_os_str(),
            OsStr::new("config"),
            OsStr::new("--bool"),
            OsStr::new("core.bare"),
            OsStr::new("false"),
        ];
        check(&unbare, run_git(None, &unbare)?)?;

        debug!(dest = %dest.display(), "opened working copy");
        Ok(CliRepo::open(dest))
    }
}

// ---------------------------------------------------------------------------
// CliRepo: one working copy
// ---------------------------------------------------------------------------

/// A working copy driven through the git CLI.
#[derive(Clone, Debug)]
pub struct CliRepo {
    root: PathBuf,
}

impl CliRepo {
    /// Wrap an existing working copy rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, GitError> {
        run_git(Some(&self.root), args)
    }

    fn git_ok<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, GitError> {
        check(args, self.git(args)?)
    }

    /// Write the three index stages of `path` to scratch files and re-merge
    /// them with `git merge-file`, favoring `side` on conflicting hunks.
    ///
    /// Returns `false` when git refuses (binary content), leaving the
    /// working tree untouched.
    fn remerge(&self, path: &Path, side: Side) -> Result<bool, GitError> {
        let scratch = tempfile::tempdir()?;
        let mut staged = Vec::with_capacity(3);
        for (stage, name) in [(2, "current"), (1, "base"), (3, "other")] {
            let spec = OsString::from(format!(":{stage}:{}", path.to_string_lossy()));
            let out = self.git_ok(&[OsString::from("show"), spec])?;
            let file = scratch.path().join(name);
            fs::write(&file, &out.stdout)?;
            staged.push(file);
        }

        let flag = format!("--{side}");
        let out = self.git(&[
            OsStr::new("merge-file"),
            OsStr::new("-p"),
            OsStr::new(&flag),
            staged[0].as_os_str(),
            staged[1].as_os_str(),
            staged[2].as_os_str(),
        ])?;
        match out.status.code() {
            // Non-negative codes count conflicts; with a favored side there are none.
            Some(code) if (0..=127).contains(&code) => {
                fs::write(self.root.join(path), &out.stdout)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// `false` when `path` carries `-merge` and must be resolved whole-file.
    fn is_text_mergeable(&self, path: &Path) -> Result<bool, GitError> {
        let out = self.git_ok(&[
            OsStr::new("check-attr"),
            OsStr::new("merge"),
            OsStr::new("--"),
            path.as_os_str(),
        ])?;
        // "<path>: merge: <unset|set|unspecified|value>"
        let line = String::from_utf8_lossy(&out.stdout);
        Ok(!line.trim_end().ends_with(": unset"))
    }
}

impl GitRepo for CliRepo {
    fn workdir(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let out = self.git(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !out.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&out.stdout);
        Ok(Some(BranchName::new(name.trim())?))
    }

    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError> {
        let full = format!("refs/heads/{name}");
        let out = self.git(&["rev-parse", "--verify", "--quiet", full.as_str()])?;
        Ok(out.status.success())
    }

    fn create_branch(&self, name: &BranchName) -> Result<(), GitError> {
        self.git_ok(&["branch", name.as_str()])?;
        Ok(())
    }

    fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
        if !self.branch_exists(name)? {
            return Err(GitError::NotFound {
                message: format!("branch `{name}` in {}", self.root.display()),
            });
        }
        self.git_ok(&["checkout", "-q", "-f", name.as_str()])?;
        Ok(())
    }

    fn stage_all(&self) -> Result<(), GitError> {
        self.git_ok(&["add", "-A"])?;
        Ok(())
    }

    fn commit(&self, message: &str, author: &Signature) -> Result<(), GitError> {
        let mut args: Vec<String> = identity_args(author).into();
        args.extend(
            ["commit", "-q", "--allow-empty", "--no-verify", "-m", message].map(str::to_owned),
        );
        self.git_ok(&args)?;
        Ok(())
    }

    fn merge(&self, branch: &BranchName, options: &MergeOptions) -> Result<MergeOutcome, GitError> {
        let mut args: Vec<String> = Vec::new();
        if let Some(auto) = &options.auto_commit {
            args.extend(identity_args(&auto.author));
        }
        args.extend(["merge", "--no-ff", "--no-edit"].map(str::to_owned));
        match &options.auto_commit {
            Some(auto) => args.extend(["-m".to_owned(), auto.message.clone()]),
            None => args.push("--no-commit".to_owned()),
        }
        if let Some(side) = options.favor {
            args.extend(["-X".to_owned(), side.as_str().to_owned()]);
        }
        if !options.find_renames {
            args.extend(["-X".to_owned(), "no-renames".to_owned()]);
        }
        if options.allow_unrelated_histories {
            args.push("--allow-unrelated-histories".to_owned());
        }
        args.push(branch.as_str().to_owned());

        let out = self.git(&args)?;
        let conflicts = self.conflicts()?;
        if !out.status.success() && conflicts.is_empty() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
            let message = if stderr.is_empty() {
                String::from_utf8_lossy(&out.stdout).trim().to_owned()
            } else {
                stderr
            };
            return Err(GitError::MergeFailed {
                branch: branch.to_string(),
                message,
            });
        }

        let up_to_date = String::from_utf8_lossy(&out.stdout).contains("Already up to date");
        let committed = options.auto_commit.is_some() && out.status.success() && !up_to_date;
        debug!(
            branch = %branch,
            conflicts = conflicts.len(),
            committed,
            "merge finished"
        );
        Ok(MergeOutcome {
            conflicts,
            committed,
        })
    }

    fn conflicts(&self) -> Result<Vec<Conflict>, GitError> {
        let out = self.git_ok(&["ls-files", "-u", "-z"])?;
        let raw = String::from_utf8_lossy(&out.stdout);

        // Each record: "<mode> <oid> <stage>\t<path>"
        let mut by_path: BTreeMap<PathBuf, Conflict> = BTreeMap::new();
        for record in raw.split('\0').filter(|r| !r.is_empty()) {
            let Some((meta, path)) = record.split_once('\t') else {
                continue;
            };
            let stage = meta.split_whitespace().nth(2).unwrap_or_default();
            let entry = by_path
                .entry(PathBuf::from(path))
                .or_insert_with(|| Conflict {
                    path: PathBuf::from(path),
                    base: false,
                    ours: false,
                    theirs: false,
                });
            match stage {
                "1" => entry.base = true,
                "2" => entry.ours = true,
                "3" => entry.theirs = true,
                _ => {}
            }
        }
        Ok(by_path.into_values().collect())
    }

    fn resolve_conflict(&self, conflict: &Conflict, side: Side) -> Result<(), GitError> {
        let path = conflict.path.as_os_str();
        if !conflict.has(side) {
            self.git_ok(&[OsStr::new("rm"), OsStr::new("-q"), OsStr::new("-f"), OsStr::new("--"), path])?;
            return Ok(());
        }

        let remerged = conflict.base
            && conflict.ours
            && conflict.theirs
            && self.is_text_mergeable(&conflict.path)?
            && self.remerge(&conflict.path, side)?;
        if !remerged {
            let flag = format!("--{side}");
            self.git_ok(&[OsStr::new("checkout"), OsStr::new(&flag), OsStr::new("--"), path])?;
        }
        self.git_ok(&[OsStr::new("add"), OsStr::new("--"), path])?;
        Ok(())
    }

    fn changed_paths(&self, from: &BranchName) -> Result<BTreeSet<PathBuf>, GitError> {
        let out = self.git_ok(&[
            "diff",
            "--name-only",
            "-z",
            "--no-renames",
            from.as_str(),
            "HEAD",
            "--",
        ])?;
        Ok(String::from_utf8_lossy(&out.stdout)
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn set_identity(&self, who: &Signature) -> Result<(), GitError> {
        self.git_ok(&["config", "user.name", who.name.as_str()])?;
        self.git_ok(&["config", "user.email", who.email.as_str()])?;
        debug!(name = %who.name, email = %who.email, "committer identity set");
        Ok(())
    }

    fn write_merge_attributes(&self, mergeable_extensions: &[String]) -> Result<(), GitError> {
        let info = self.root.join(".git").join("info");
        fs::create_dir_all(&info)?;

        // Later lines win in gitattributes, so the blanket rule comes first.
        let mut body = String::from("* -merge\n");
        for ext in mergeable_extensions {
            body.push_str(&format!("*.{} merge\n", ext.trim_start_matches('.')));
        }
        fs::write(info.join("attributes"), body)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_joins_arguments() {
        assert_eq!(render(&["merge", "--no-ff", "mod/0001"]), "git merge --no-ff mod/0001");
    }

    #[test]
    fn identity_args_shape() {
        let args = identity_args(&Signature::new("modmerge", "mm@localhost"));
        assert_eq!(args[0], "-c");
        assert_eq!(args[1], "user.name=modmerge");
        assert_eq!(args[3], "user.email=mm@localhost");
    }

    #[test]
    fn open_working_copy_rejects_missing_snapshots() {
        let dest = tempfile::tempdir().unwrap();
        let substrate = GitCli::new(dest.path().join("nope"));
        let err = substrate.open_working_copy(dest.path()).unwrap_err();
        assert!(matches!(err, GitError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn open_working_copy_rejects_non_empty_destination() {
        let snapshots = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(dest.path().join("stray.txt"), "x").unwrap();
        let err = GitCli::new(snapshots.path())
            .open_working_copy(dest.path())
            .unwrap_err();
        assert!(matches!(err, GitError::WorkingCopy { .. }), "got {err:?}");
    }
}
