//! modmerge library crate: the compilation engine behind the `modmerge`
//! binary.
//!
//! Mods written for different base-game versions are loaded into a
//! [`model::LoadOrder`], then [`merge::Compiler`] replays them on top of
//! base-version snapshots held in a git repository and writes the merged
//! tree to an output directory. The modules are public so integration tests
//! can drive the engine without going through the CLI.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod merge;
pub mod model;
pub mod provider;
pub mod registry;
pub mod telemetry;
pub mod version;

pub use error::ModMergeError;
