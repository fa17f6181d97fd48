//! The merge orchestrator.
//!
//! [`Compiler::compile`] turns a load order into one merged tree:
//!
//! 1. resolve the target version and drop mods written for newer bases;
//! 2. open a [`Session`] at the first mod's snapshot;
//! 3. for each mod in effective order, upgrade the base if the mod needs a
//!    newer one, then commit the mod on its own branch;
//! 4. fold the remaining mod branches and copy the result to the output
//!    directory.
//!
//! Merge mechanics are delegated to git through [`modmerge_git`]; the rules
//! for picking a side live in [`policy`].

pub mod overlap;
pub mod policy;
pub mod session;

use std::fmt;
use std::path::{Path, PathBuf};

use modmerge_git::Substrate;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::MergeConfig;
use crate::error::ModMergeError;
use crate::model::{LoadOrder, Mod};
use crate::registry::{BaseVersion, Registry};
use crate::version::Version;

pub use overlap::find_overlaps;
pub use session::{Session, SessionState, Upgrade, core_branch};

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

/// What to compile against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileRequest {
    /// Target base version (`M.m` or `M.m.p`); the newest known version
    /// when `None`.
    pub target: Option<String>,
    /// Unload every mod after a successful compile.
    pub clear: bool,
}

/// A mod that made it into the output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedMod {
    pub name: String,
    pub version: Version,
    pub branch: String,
}

/// A mod left out because it targets a newer base than the compile target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedMod {
    pub name: String,
    pub required: Version,
    pub target: Version,
}

impl fmt::Display for SkippedMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skipped mod \"{}\": it requires {}, newer than the target {}",
            self.name, self.required, self.target
        )
    }
}

/// Files a mod overwrites in a tree built for a different base version.
/// Advisory: the merged output already reflects the conflict policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Override {
    pub name: String,
    pub version: Version,
    pub paths: Vec<PathBuf>,
}

/// Outcome of a successful compile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    /// Directory holding the merged tree.
    pub output: PathBuf,
    pub target: Version,
    /// Mods in the order they were applied.
    pub applied: Vec<AppliedMod>,
    pub skipped: Vec<SkippedMod>,
    pub overrides: Vec<Override>,
    pub upgrades: Vec<Upgrade>,
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Everything a compile needs besides the load order.
pub struct Compiler<'a, S: Substrate> {
    substrate: &'a S,
    registry: &'a Registry,
    merge: &'a MergeConfig,
    work_root: PathBuf,
    output_root: PathBuf,
}

impl<'a, S: Substrate> Compiler<'a, S> {
    /// `work_root` receives session working copies; compiled trees are
    /// written under `output_root`.
    pub fn new(
        substrate: &'a S,
        registry: &'a Registry,
        merge: &'a MergeConfig,
        work_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            substrate,
            registry,
            merge,
            work_root: work_root.into(),
            output_root: output_root.into(),
        }
    }

    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn snapshot_for(&self, m: &Mod) -> Result<BaseVersion, ModMergeError> {
        let unknown = |component| ModMergeError::UnknownVersion {
            version: m.version().dotted(),
            component,
            required_by: Some(m.name().to_owned()),
        };
        self.registry.check(m.version()).map_err(unknown)?;
        self.registry
            .resolve_snapshot(m.version())
            .ok_or_else(|| unknown(crate::registry::VersionComponent::Minor))
    }

    /// Compile `load_order` into a fresh output directory.
    ///
    /// # Errors
    /// - [`ModMergeError::NoModsLoaded`] for an empty load order;
    /// - [`ModMergeError::UnknownVersion`] for a bad target or a mod
    ///   requiring a version with no snapshot;
    /// - [`ModMergeError::AllModsSkipped`] when every mod targets a newer
    ///   base;
    /// - substrate and I/O errors from the session.
    ///
    /// All validation happens before the substrate is touched.
    #[instrument(name = "compile", skip_all, fields(target = request.target.as_deref().unwrap_or("latest")))]
    pub fn compile(
        &self,
        load_order: &mut LoadOrder,
        request: &CompileRequest,
    ) -> Result<CompileReport, ModMergeError> {
        if load_order.is_empty() {
            return Err(ModMergeError::NoModsLoaded);
        }
        let target = match &request.target {
            Some(text) => self.registry.validate_version_string(text)?,
            None => self.registry.latest(),
        };

        let mut skipped = Vec::new();
        let mut applicable: Vec<(&Mod, BaseVersion)> = Vec::new();
        for m in load_order.effective_order() {
            if m.version().exceeds(&target) {
                let skip = SkippedMod {
                    name: m.name().to_owned(),
                    required: m.version().clone(),
                    target: target.clone(),
                };
                warn!("{skip}");
                skipped.push(skip);
                continue;
            }
            applicable.push((m, self.snapshot_for(m)?));
        }
        let Some(&(_, first_base)) = applicable.first() else {
            return Err(ModMergeError::AllModsSkipped {
                target,
                skipped: skipped.len(),
            });
        };

        let mut session = Session::open(
            self.substrate,
            &self.work_root,
            first_base,
            self.merge.signature(),
            &self.merge.mergeable_extensions,
        )?;
        let mut applied = Vec::new();
        let mut overrides = Vec::new();
        let mut upgrades = Vec::new();

        for (m, snapshot) in &applicable {
            if m.version().exceeds(&session.base().into()) {
                upgrades.push(session.upgrade(*snapshot)?);
            }
            if *m.version() != target {
                let paths = session.overlaps(m)?;
                if !paths.is_empty() {
                    warn!(
                        name = m.name(),
                        version = %m.version(),
                        files = paths.len(),
                        "mod written for {} overrides files of the merged tree",
                        m.version()
                    );
                    overrides.push(Override {
                        name: m.name().to_owned(),
                        version: m.version().clone(),
                        paths,
                    });
                }
            }
            let branch = session.apply_mod(m)?;
            applied.push(AppliedMod {
                name: m.name().to_owned(),
                version: m.version().clone(),
                branch: branch.to_string(),
            });
        }

        let output = session.finalize(&self.output_root, &target.to_string())?;
        info!(
            output = %output.display(),
            applied = applied.len(),
            skipped = skipped.len(),
            upgrades = upgrades.len(),
            "compilation finished"
        );

        if request.clear {
            load_order.clear()?;
        }
        Ok(CompileReport {
            output,
            target,
            applied,
            skipped,
            overrides,
            upgrades,
        })
    }
}
