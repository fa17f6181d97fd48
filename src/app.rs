//! State shared by the one-shot commands and the interactive shell.

use std::path::{Path, PathBuf};

use modmerge::cleanup::RunDir;
use modmerge::config::ModMergeConfig;
use modmerge::error::ModMergeError;
use modmerge::merge::{CompileReport, CompileRequest, Compiler};
use modmerge::model::{LoadOrder, LoadOutcome, ModKey};
use modmerge::provider::{FsModProvider, ModProvider, SearchHit};
use modmerge::registry::{Registry, RegistryLoader};
use modmerge_git::GitCli;
use tracing::warn;

pub struct App {
    config: ModMergeConfig,
    registry: RegistryLoader,
    provider: FsModProvider,
    substrate: GitCli,
    /// Parent of session working copies, inside this process's run directory.
    git_work: PathBuf,
}

impl App {
    pub fn new(config: ModMergeConfig, run: &RunDir) -> Self {
        Self {
            registry: RegistryLoader::new(config.paths.versions_file.clone()),
            provider: FsModProvider::new(&config.paths, &config.merge, run.mods()),
            substrate: GitCli::new(config.paths.snapshots.clone()),
            git_work: run.git(),
            config,
        }
    }

    pub const fn config(&self) -> &ModMergeConfig {
        &self.config
    }

    pub const fn substrate(&self) -> &GitCli {
        &self.substrate
    }

    pub const fn provider(&self) -> &FsModProvider {
        &self.provider
    }

    pub fn git_work(&self) -> &Path {
        &self.git_work
    }

    /// The version registry, read on first use.
    pub fn registry(&mut self) -> Result<&Registry, ModMergeError> {
        self.registry.get()
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModMergeError> {
        self.provider.search(query)
    }

    /// Load the mod named by `id` into `load_order`. Returns `false` when a
    /// mod with the same definition is already loaded.
    pub fn load_id(&self, load_order: &mut LoadOrder, id: &str) -> Result<bool, ModMergeError> {
        let (definition, _) = self.provider.resolve_id(id);
        self.load_definition(load_order, &definition)
    }

    /// Load the mod defined at `definition`, skipping extraction when it
    /// is already present.
    pub fn load_definition(
        &self,
        load_order: &mut LoadOrder,
        definition: &Path,
    ) -> Result<bool, ModMergeError> {
        let key = ModKey::from_path(definition);
        if let Some(existing) = load_order.get(&key) {
            warn!(name = existing.name(), "mod is already loaded");
            return Ok(false);
        }
        match load_order.load(self.provider.load(definition)?) {
            LoadOutcome::Loaded => Ok(true),
            LoadOutcome::Duplicate(rejected) => {
                rejected.release()?;
                Ok(false)
            }
        }
    }

    pub fn compile(
        &mut self,
        load_order: &mut LoadOrder,
        request: &CompileRequest,
    ) -> Result<CompileReport, ModMergeError> {
        let registry = self.registry.get()?;
        Compiler::new(
            &self.substrate,
            registry,
            &self.config.merge,
            self.git_work.clone(),
            self.config.paths.output.clone(),
        )
        .compile(load_order, request)
    }
}
