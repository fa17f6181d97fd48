use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modmerge::cleanup::{self, RunDir};
use modmerge::config::{DEFAULT_CONFIG_FILE, ModMergeConfig};
use modmerge::error::ModMergeError;
use modmerge::telemetry;

mod app;
mod compile_cmd;
mod format;
mod inspect;
mod shell;

/// Compile game mods written for different base-game versions into one
///
/// Every base-game version has a snapshot branch (`core/v1.0.1`) in a git
/// repository. Mods are applied in load order, oldest base version first;
/// when a mod needs a newer base, the work so far is merged onto that
/// snapshot. Later mods win over earlier ones, and the merged result is
/// written to a fresh output directory.
///
/// QUICK START:
///
///   modmerge versions
///   modmerge search ships
///   modmerge compile ugc_123 ugc_456 -t 1.0
///
///   # or interactively
///   modmerge shell
///   > load ugc_123
///   > load -s better ships
///   > list -f -v
///   > compile -c
///
/// Set MODMERGE_LOG=debug to see every merge step on stderr.
#[derive(Parser)]
#[command(name = "modmerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'modmerge <command> --help' for more information on a specific command.")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "MODMERGE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load mods and compile them into one
    ///
    /// Mods are given as definition files from the game's `mod` folder, or
    /// found by name with -s. A search must match exactly one mod.
    Compile(compile_cmd::CompileArgs),

    /// Interactive session: load, list, and compile mods
    Shell,

    /// Show the known base-game versions
    Versions(inspect::VersionsArgs),

    /// Find mods by name
    Search(inspect::SearchArgs),

    /// List the base files a mod overrides
    ///
    /// Checks out the base snapshot for the mod's version (or --target) and
    /// lists every file the mod would replace.
    Conflicts(inspect::ConflictsArgs),
}

fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<ModMergeError>()
                .map_or(1, ModMergeError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ModMergeConfig::load(&cli.config).map_err(ModMergeError::from)?;
    let run = RunDir::create(&config.paths.temp).with_context(|| {
        format!("creating a run directory in {}", config.paths.temp.display())
    })?;
    cleanup::install_interrupt_cleanup(run.path().to_owned())
        .context("installing interrupt handler")?;

    // Dropped before `run`, so extracted mods are released first.
    let mut app = app::App::new(config, &run);
    match cli.command {
        Commands::Compile(ref args) => compile_cmd::run(&mut app, args),
        Commands::Shell => shell::run(&mut app),
        Commands::Versions(ref args) => inspect::versions(&mut app, args),
        Commands::Search(ref args) => inspect::search(&app, args),
        Commands::Conflicts(ref args) => inspect::conflicts(&mut app, args),
    }
}
