//! Mods and the load order.
//!
//! - [`descriptor`] reads `.mod` definition files.
//! - [`mod_def`] holds a loaded [`Mod`] and its extracted files.
//! - [`load_order`] keeps mods in load order and derives the compile order.

pub mod descriptor;
pub mod load_order;
pub mod mod_def;

pub use descriptor::{DEFINITION_EXTENSION, ModDescriptor};
pub use load_order::{LoadOrder, LoadOutcome};
pub use mod_def::{Mod, ModKey, UNNAMED};
