//! Temporary-file cleanup on startup, shutdown, and interrupt.
//!
//! Each process keeps its extracted mods and session working copies in its
//! own run directory, `<temp>/run-<pid>`. Nothing else under the configured
//! temp root is ever touched: other processes may be using their own run
//! directories, and the root may hold unrelated files.
//!
//! The run directory is removed when the tool exits normally ([`RunDir`]'s
//! drop) and on SIGINT/SIGTERM ([`install_interrupt_cleanup`]). Run
//! directories left behind by killed processes are removed at startup once
//! their owner is known to be gone. Removal is idempotent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

/// Exit code after an interrupt.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

const RUN_PREFIX: &str = "run-";

/// Remove `dir` and everything under it. A missing directory is fine.
///
/// # Errors
/// Returns the removal failure.
pub fn remove_run(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "run directory removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// The pid encoded in a run directory name, if `name` is one.
fn run_owner(name: &str) -> Option<u32> {
    name.strip_prefix(RUN_PREFIX)?.parse().ok()
}

/// Whether the process `pid` may still be running. Without `/proc` there is
/// no way to tell, so every owner counts as alive.
fn owner_alive(pid: u32) -> bool {
    let proc = Path::new("/proc");
    !proc.join("self").exists() || proc.join(pid.to_string()).exists()
}

/// Remove run directories under `temp_root` whose owning process is gone.
/// Returns how many were removed.
///
/// # Errors
/// Fails if `temp_root` exists but cannot be listed. Individual removal
/// failures are logged and skipped.
pub fn sweep_stale(temp_root: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(temp_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(run_owner) else {
            continue;
        };
        if pid == std::process::id() || owner_alive(pid) || !entry.file_type()?.is_dir() {
            continue;
        }
        match remove_run(&entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(dir = %entry.path().display(), error = %e, "could not remove stale run"),
        }
    }
    Ok(removed)
}

/// This process's scratch directory under the temp root, removed on drop.
#[derive(Debug)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Create `<temp_root>/run-<pid>`, first removing stale run directories.
    ///
    /// # Errors
    /// Fails if the temp root or the run directory cannot be created.
    pub fn create(temp_root: &Path) -> io::Result<Self> {
        fs::create_dir_all(temp_root)?;
        let stale = sweep_stale(temp_root)?;
        if stale > 0 {
            debug!(root = %temp_root.display(), stale, "removed stale runs");
        }

        let path = temp_root.join(format!("{RUN_PREFIX}{}", std::process::id()));
        // A leftover from an earlier process that had the same pid.
        remove_run(&path)?;
        fs::create_dir(&path)?;
        debug!(dir = %path.display(), "run directory created");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where loaded mods are extracted.
    #[must_use]
    pub fn mods(&self) -> PathBuf {
        self.path.join("mods")
    }

    /// Where session working copies are cloned.
    #[must_use]
    pub fn git(&self) -> PathBuf {
        self.path.join("git")
    }
}

impl Drop for RunDir {
    fn drop(&mut self) {
        if let Err(e) = remove_run(&self.path) {
            warn!(dir = %self.path.display(), error = %e, "could not remove temporary files");
        }
    }
}

/// Install a SIGINT/SIGTERM handler that removes `run_dir` and exits with
/// [`EXIT_CODE_INTERRUPTED`]. A second signal during removal exits
/// immediately.
///
/// # Errors
/// Fails if a handler is already installed.
pub fn install_interrupt_cleanup(run_dir: PathBuf) -> Result<(), ctrlc::Error> {
    let interrupted = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(EXIT_CODE_INTERRUPTED);
        }
        eprintln!("\nInterrupted, removing temporary files...");
        if let Err(e) = remove_run(&run_dir) {
            eprintln!("warning: could not clean {}: {e}", run_dir.display());
        }
        std::process::exit(EXIT_CODE_INTERRUPTED);
    })
}
