//! Shared test helpers for modmerge integration tests.
//!
//! Every test builds its own world in a temp directory: a snapshot repo
//! with `core/v*` branches, a versions file, and a game user directory with
//! mod definitions. Nothing outside the temp directory is touched.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use modmerge::config::{MergeConfig, ModMergeConfig, PathsConfig};
use modmerge::error::ModMergeError;
use modmerge::merge::{CompileReport, CompileRequest, Compiler};
use modmerge::model::LoadOrder;
use modmerge::provider::{FsModProvider, ModProvider};
use modmerge::registry::Registry;
use modmerge_git::GitCli;

pub const VERSIONS: &str = "// known base versions\n1\n\t0\n\t\t0\n\t\t1\n2\n\t0\n\t\t0\n";

#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

pub const A_V100: &str = "line1\nline2\nline3\n";
pub const A_V101: &str = "line1\nline2\nline3 patched\n";

pub fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

pub fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("create parent dirs");
    fs::write(path, content).expect("write file");
}

pub fn read(dir: &Path, rel: &str) -> String {
    fs::read_to_string(dir.join(rel)).unwrap_or_else(|e| panic!("read {rel}: {e}"))
}

fn commit_snapshot(root: &Path, version: &str) {
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", &format!("base {version}")]);
    git(root, &["branch", &format!("core/v{version}")]);
}

/// One test world.
pub struct World {
    pub dir: TempDir,
}

impl World {
    /// Snapshots, linear history:
    ///
    /// - `core/v1.0.0`: `common/a.txt`, `common/shared.txt`, `gfx/icon.dds`
    /// - `core/v1.0.1`: `common/a.txt` patched, `common/new.txt` added
    /// - `core/v2.0.0`: `gfx/icon.dds` replaced, `common/v2.txt` added
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let world = Self { dir };

        let snapshots = world.snapshots();
        fs::create_dir_all(&snapshots).expect("create snapshots dir");
        git(&snapshots, &["init", "-q", "-b", "main"]);
        git(&snapshots, &["config", "user.email", "snapshots@test"]);
        git(&snapshots, &["config", "user.name", "Snapshots"]);

        write(&snapshots, "common/a.txt", A_V100);
        write(&snapshots, "common/shared.txt", "shared base\n");
        write(&snapshots, "gfx/icon.dds", "DDS-v1");
        commit_snapshot(&snapshots, "1.0.0");

        write(&snapshots, "common/a.txt", A_V101);
        write(&snapshots, "common/new.txt", "new in 1.0.1\n");
        commit_snapshot(&snapshots, "1.0.1");

        write(&snapshots, "gfx/icon.dds", "DDS-v2");
        write(&snapshots, "common/v2.txt", "new in 2.0.0\n");
        commit_snapshot(&snapshots, "2.0.0");

        write(world.root(), "versions.txt", VERSIONS);
        fs::create_dir_all(world.mods_dir().join("mod")).expect("create definitions dir");
        world
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn snapshots(&self) -> PathBuf {
        self.root().join("snapshots")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root().join("Stellaris")
    }

    pub fn paths(&self) -> PathsConfig {
        PathsConfig {
            versions_file: self.root().join("versions.txt"),
            snapshots: self.snapshots(),
            output: self.root().join("out"),
            temp: self.root().join("tmp"),
            mods_dir: self.mods_dir(),
        }
    }

    pub fn config(&self) -> ModMergeConfig {
        ModMergeConfig {
            paths: self.paths(),
            merge: MergeConfig::default(),
        }
    }

    /// Write `modmerge.toml` for the CLI and return its path.
    pub fn write_config_file(&self) -> PathBuf {
        let p = self.paths();
        let text = format!(
            "[paths]\nversions_file = '{}'\nsnapshots = '{}'\noutput = '{}'\ntemp = '{}'\nmods_dir = '{}'\n",
            p.versions_file.display(),
            p.snapshots.display(),
            p.output.display(),
            p.temp.display(),
            p.mods_dir.display(),
        );
        let path = self.root().join("modmerge.toml");
        fs::write(&path, text).expect("write config");
        path
    }

    /// Add a mod folder `mod/<id>` and its definition `mod/<id>.mod`.
    pub fn add_mod(&self, id: &str, name: &str, version: &str, files: &[(&str, &str)]) -> PathBuf {
        let folder = self.mods_dir().join("mod").join(id);
        for (rel, content) in files {
            write(&folder, rel, content);
        }
        fs::create_dir_all(&folder).expect("create mod folder");
        let definition = self.mods_dir().join("mod").join(format!("{id}.mod"));
        fs::write(
            &definition,
            format!(
                "name=\"{name}\"\npath=\"mod/{id}\"\ntags={{\n\t\"Gameplay\"\n}}\nsupported_version=\"{version}\"\n"
            ),
        )
        .expect("write definition");
        definition
    }

    pub fn provider(&self) -> FsModProvider {
        let config = self.config();
        FsModProvider::new(&config.paths, &config.merge, self.root().join("tmp/mods"))
    }

    pub fn registry(&self) -> Registry {
        Registry::parse(VERSIONS).expect("fixture versions parse")
    }

    /// Load mods by id, in order.
    pub fn load(&self, ids: &[&str]) -> LoadOrder {
        let provider = self.provider();
        let mut load_order = LoadOrder::new();
        for id in ids {
            let (definition, _) = provider.resolve_id(id);
            let loaded = provider.load(&definition).expect("mod loads");
            assert!(load_order.load(loaded).is_loaded(), "{id} loaded twice");
        }
        load_order
    }

    pub fn compile(
        &self,
        load_order: &mut LoadOrder,
        target: Option<&str>,
        clear: bool,
    ) -> Result<CompileReport, ModMergeError> {
        let config = self.config();
        let substrate = GitCli::new(self.snapshots());
        let registry = self.registry();
        Compiler::new(
            &substrate,
            &registry,
            &config.merge,
            self.root().join("tmp/git"),
            config.paths.output.clone(),
        )
        .compile(
            load_order,
            &CompileRequest {
                target: target.map(str::to_owned),
                clear,
            },
        )
    }

    /// A `modmerge` command with this world's config, run as a user with no
    /// git configuration of their own.
    pub fn command(&self) -> Command {
        let config = self.write_config_file();
        let home = self.root().join("home");
        fs::create_dir_all(&home).expect("create home dir");
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_modmerge"));
        cmd.arg("--config")
            .arg(config)
            .current_dir(self.root())
            .env_remove("MODMERGE_LOG")
            .env("HOME", &home)
            .env("XDG_CONFIG_HOME", &home)
            .env("GIT_CONFIG_GLOBAL", NULL_DEVICE)
            .env("GIT_CONFIG_NOSYSTEM", "1");
        for var in [
            "GIT_AUTHOR_NAME",
            "GIT_AUTHOR_EMAIL",
            "GIT_COMMITTER_NAME",
            "GIT_COMMITTER_EMAIL",
            "EMAIL",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Run the `modmerge` binary with this world's config.
    pub fn modmerge(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("failed to run modmerge")
    }
}

/// Every file under `dir`, relative, sorted.
pub fn tree(dir: &Path) -> Vec<String> {
    modmerge::fsutil::list_files(dir)
        .expect("list output")
        .into_iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect()
}
