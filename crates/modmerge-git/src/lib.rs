//! Version-control substrate for modmerge.
//!
//! This crate defines the [`GitRepo`] trait, the single interface through
//! which the compilation engine drives branch, commit, and merge operations.
//! The engine never shells out to git itself; it depends on `modmerge-git`
//! and programs against the trait.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] and [`Substrate`] trait definitions.
//! - [`types`]: value types used in trait signatures ([`BranchName`],
//!   [`MergeOptions`], [`Conflict`], etc.).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;

// git CLI-backed implementation
mod cli_repo;

pub use cli_repo::{CliRepo, GitCli};

// Re-export the main traits and commonly used types at the crate root for
// ergonomic imports: `use modmerge_git::{GitRepo, BranchName, GitError};`
pub use error::GitError;
pub use repo::{GitRepo, Substrate};
pub use types::{
    AutoCommit, BranchName, BranchNameError, Conflict, MergeOptions, MergeOutcome, Side, Signature,
};
