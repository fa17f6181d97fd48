use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use modmerge_git::{
    AutoCommit, BranchName, GitCli, GitError, GitRepo, MergeOptions, Side, Signature, Substrate,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", message]);
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

fn author() -> Signature {
    Signature::new("Test User", "test@test.com")
}

/// Snapshot repo with two linear base versions:
/// `core/v1.0.0` (common/a.txt, gfx/icon.dds) and `core/v1.0.1`
/// (common/a.txt changed, common/new.txt added).
fn setup_snapshots() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    git(root, &["init", "-q", "-b", "main"]);
    git(root, &["config", "user.email", "test@test.com"]);
    git(root, &["config", "user.name", "Test User"]);

    write(root, "common/a.txt", "line1\nline2\nline3\n");
    write(root, "gfx/icon.dds", "DDS-v1");
    commit_all(root, "base 1.0.0");
    git(root, &["branch", "core/v1.0.0"]);

    write(root, "common/a.txt", "line1\nline2\nline3 patched\n");
    write(root, "common/new.txt", "new in 1.0.1\n");
    commit_all(root, "base 1.0.1");
    git(root, &["branch", "core/v1.0.1"]);

    dir
}

fn open(snapshots: &TempDir) -> (TempDir, modmerge_git::CliRepo) {
    let dest = TempDir::new().unwrap();
    let repo = GitCli::new(snapshots.path())
        .open_working_copy(dest.path())
        .unwrap();
    repo.set_identity(&author()).unwrap();
    (dest, repo)
}

fn no_commit(favor: Option<Side>) -> MergeOptions {
    MergeOptions {
        favor,
        ..MergeOptions::default()
    }
}

// ===========================================================================
// Working copies and branches
// ===========================================================================

#[test]
fn working_copy_carries_every_branch() {
    let snapshots = setup_snapshots();
    let (_dest, repo) = open(&snapshots);
    assert!(repo.branch_exists(&branch("core/v1.0.0")).unwrap());
    assert!(repo.branch_exists(&branch("core/v1.0.1")).unwrap());
    assert!(!repo.branch_exists(&branch("core/v9.9.9")).unwrap());
}

#[test]
fn checkout_materializes_snapshot() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    assert_eq!(
        fs::read_to_string(dest.path().join("common/a.txt")).unwrap(),
        "line1\nline2\nline3\n"
    );
    assert!(!dest.path().join("common/new.txt").exists());
    assert_eq!(
        repo.current_branch().unwrap(),
        Some(branch("core/v1.0.0"))
    );
}

#[test]
fn checkout_unknown_branch_is_not_found() {
    let snapshots = setup_snapshots();
    let (_dest, repo) = open(&snapshots);
    let err = repo.checkout(&branch("core/v3.0.0")).unwrap_err();
    assert!(matches!(err, GitError::NotFound { .. }), "got {err:?}");
}

#[test]
fn create_branch_does_not_switch() {
    let snapshots = setup_snapshots();
    let (_dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.create_branch(&branch("mod/0001")).unwrap();
    assert!(repo.branch_exists(&branch("mod/0001")).unwrap());
    assert_eq!(
        repo.current_branch().unwrap(),
        Some(branch("core/v1.0.0"))
    );
}

#[test]
fn commit_allows_empty_and_records_changes() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.create_branch(&branch("mod/0001")).unwrap();
    repo.checkout(&branch("mod/0001")).unwrap();

    repo.stage_all().unwrap();
    repo.commit("empty", &author()).unwrap();

    write(dest.path(), "events/mod.txt", "event = {}\n");
    repo.stage_all().unwrap();
    repo.commit("add mod file", &author()).unwrap();

    let changed = repo.changed_paths(&branch("core/v1.0.0")).unwrap();
    assert_eq!(
        changed.into_iter().collect::<Vec<_>>(),
        vec![Path::new("events/mod.txt").to_path_buf()]
    );
}

// ===========================================================================
// Merging
// ===========================================================================

#[test]
fn clean_merge_without_auto_commit_leaves_merge_pending() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.create_branch(&branch("mod/0001")).unwrap();
    repo.create_branch(&branch("work")).unwrap();
    repo.checkout(&branch("mod/0001")).unwrap();
    write(dest.path(), "events/one.txt", "one\n");
    repo.stage_all().unwrap();
    repo.commit("mod one", &author()).unwrap();
    repo.checkout(&branch("work")).unwrap();

    let outcome = repo.merge(&branch("mod/0001"), &no_commit(None)).unwrap();
    assert!(outcome.is_clean());
    assert!(!outcome.committed);
    assert!(dest.path().join("events/one.txt").exists());
    assert!(dest.path().join(".git/MERGE_HEAD").exists());

    repo.commit("merged", &author()).unwrap();
    assert!(!dest.path().join(".git/MERGE_HEAD").exists());
    let changed = repo.changed_paths(&branch("core/v1.0.0")).unwrap();
    assert_eq!(
        changed.into_iter().collect::<Vec<_>>(),
        vec![Path::new("events/one.txt").to_path_buf()]
    );
}

#[test]
fn no_commit_merge_needs_only_the_working_copy_identity() {
    let snapshots = setup_snapshots();
    let dest = TempDir::new().unwrap();
    let repo = GitCli::new(snapshots.path())
        .open_working_copy(dest.path())
        .unwrap();
    repo.set_identity(&Signature::new("modmerge", "modmerge@localhost"))
        .unwrap();

    let config = Command::new("git")
        .args(["config", "--local", "user.email"])
        .current_dir(dest.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&config.stdout).trim(), "modmerge@localhost");

    // Diverge so the merge cannot fast-forward and must record a committer.
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.create_branch(&branch("work")).unwrap();
    repo.checkout(&branch("work")).unwrap();
    write(dest.path(), "events/work.txt", "work\n");
    repo.stage_all().unwrap();
    repo.commit("work", &author()).unwrap();

    let outcome = repo.merge(&branch("core/v1.0.1"), &no_commit(None)).unwrap();
    assert!(outcome.is_clean());
    repo.commit("merged", &author()).unwrap();
    assert_eq!(
        fs::read_to_string(dest.path().join("common/new.txt")).unwrap(),
        "new in 1.0.1\n"
    );
}

#[test]
fn auto_commit_merge_commits() {
    let snapshots = setup_snapshots();
    let (_dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    let options = MergeOptions {
        auto_commit: Some(AutoCommit {
            message: "upgrade".to_owned(),
            author: author(),
        }),
        ..MergeOptions::default()
    };
    let outcome = repo.merge(&branch("core/v1.0.1"), &options).unwrap();
    assert!(outcome.is_clean());
    assert!(outcome.committed);
    assert!(repo.conflicts().unwrap().is_empty());
}

#[test]
fn favor_theirs_resolves_text_hunks() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.write_merge_attributes(&["txt".to_owned()]).unwrap();

    for (name, content) in [("mod/0001", "first"), ("mod/0002", "second")] {
        repo.create_branch(&branch(name)).unwrap();
        repo.checkout(&branch(name)).unwrap();
        write(dest.path(), "common/a.txt", &format!("line1\nline2\n{content}\n"));
        repo.stage_all().unwrap();
        repo.commit(name, &author()).unwrap();
        repo.checkout(&branch("core/v1.0.0")).unwrap();
    }

    repo.create_branch(&branch("final/0003")).unwrap();
    repo.checkout(&branch("final/0003")).unwrap();
    for name in ["mod/0001", "mod/0002"] {
        let outcome = repo.merge(&branch(name), &no_commit(Some(Side::Theirs))).unwrap();
        assert!(outcome.is_clean(), "{name}: {:?}", outcome.conflicts);
        repo.commit(&format!("merged {name}"), &author()).unwrap();
    }
    assert_eq!(
        fs::read_to_string(dest.path().join("common/a.txt")).unwrap(),
        "line1\nline2\nsecond\n"
    );
}

#[test]
fn binary_files_resolve_whole_file() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.write_merge_attributes(&["txt".to_owned()]).unwrap();

    for (name, content) in [("mod/0001", "DDS-first"), ("mod/0002", "DDS-second")] {
        repo.create_branch(&branch(name)).unwrap();
        repo.checkout(&branch(name)).unwrap();
        write(dest.path(), "gfx/icon.dds", content);
        repo.stage_all().unwrap();
        repo.commit(name, &author()).unwrap();
        repo.checkout(&branch("core/v1.0.0")).unwrap();
    }

    repo.create_branch(&branch("final/0003")).unwrap();
    repo.checkout(&branch("final/0003")).unwrap();
    repo.merge(&branch("mod/0001"), &no_commit(None)).unwrap();
    repo.commit("one", &author()).unwrap();

    let outcome = repo.merge(&branch("mod/0002"), &no_commit(None)).unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.path, Path::new("gfx/icon.dds"));
    assert!(conflict.base && conflict.ours && conflict.theirs);

    repo.resolve_conflict(conflict, Side::Theirs).unwrap();
    assert!(repo.conflicts().unwrap().is_empty());
    repo.commit("two", &author()).unwrap();
    assert_eq!(
        fs::read_to_string(dest.path().join("gfx/icon.dds")).unwrap(),
        "DDS-second"
    );
}

#[test]
fn resolve_text_conflict_keeps_non_conflicting_hunks() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.write_merge_attributes(&["txt".to_owned()]).unwrap();
    repo.create_branch(&branch("merge/0001-v1.0.0")).unwrap();
    repo.checkout(&branch("merge/0001-v1.0.0")).unwrap();

    // Mod edits line1 and line3; 1.0.1 edits line3 only.
    write(dest.path(), "common/a.txt", "LINE1\nline2\nmod line3\n");
    repo.stage_all().unwrap();
    repo.commit("mod content", &author()).unwrap();

    let outcome = repo.merge(&branch("core/v1.0.1"), &no_commit(None)).unwrap();
    let conflict = outcome
        .conflicts
        .iter()
        .find(|c| c.path == Path::new("common/a.txt"))
        .expect("a.txt conflicts");
    repo.resolve_conflict(conflict, Side::Ours).unwrap();
    repo.commit("upgrade", &author()).unwrap();

    assert_eq!(
        fs::read_to_string(dest.path().join("common/a.txt")).unwrap(),
        "LINE1\nline2\nmod line3\n"
    );
    assert_eq!(
        fs::read_to_string(dest.path().join("common/new.txt")).unwrap(),
        "new in 1.0.1\n"
    );
}

#[test]
fn resolve_in_favor_of_deleting_side_removes_path() {
    let snapshots = setup_snapshots();
    let (dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();

    repo.create_branch(&branch("mod/0001")).unwrap();
    repo.checkout(&branch("mod/0001")).unwrap();
    fs::remove_file(dest.path().join("common/a.txt")).unwrap();
    repo.stage_all().unwrap();
    repo.commit("delete a", &author()).unwrap();

    repo.checkout(&branch("core/v1.0.0")).unwrap();
    repo.create_branch(&branch("mod/0002")).unwrap();
    repo.checkout(&branch("mod/0002")).unwrap();
    write(dest.path(), "common/a.txt", "rewritten\n");
    repo.stage_all().unwrap();
    repo.commit("edit a", &author()).unwrap();

    let outcome = repo
        .merge(&branch("mod/0001"), &no_commit(Some(Side::Theirs)))
        .unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].describe(), "deleted by them");
    repo.resolve_conflict(&outcome.conflicts[0], Side::Theirs)
        .unwrap();
    repo.commit("resolved", &author()).unwrap();
    assert!(!dest.path().join("common/a.txt").exists());
}

#[test]
fn merge_of_unknown_branch_fails() {
    let snapshots = setup_snapshots();
    let (_dest, repo) = open(&snapshots);
    repo.checkout(&branch("core/v1.0.0")).unwrap();
    let err = repo
        .merge(&branch("mod/9999"), &MergeOptions::default())
        .unwrap_err();
    assert!(matches!(err, GitError::MergeFailed { .. }), "got {err:?}");
}
