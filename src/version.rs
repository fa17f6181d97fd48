//! Base-game version numbers.
//!
//! A [`Version`] is a sequence of non-negative integers of any depth. Mod
//! requirements may end in `*` wildcards (`2.0.*`), which normalize to `0`.
//!
//! Two orderings exist and they are not interchangeable:
//!
//! - [`Version::cmp_prefix`] compares only as many components as the
//!   shorter version has, so `1.0` is neither newer nor older than `1.0.3`.
//!   This is what "does this mod need a newer base" means.
//! - [`Ord`] is plain lexicographic order (a shorter prefix sorts first). It
//!   is total, which makes it safe as a sort key.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// An ordered sequence of version components, e.g. `v1.0.1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(Vec<u32>);

impl Version {
    /// Build a version from its components.
    #[must_use]
    pub const fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    /// Parse a version or requirement string.
    ///
    /// Accepts an optional leading `v`/`V`, surrounding whitespace, and
    /// trailing `*` components (each becomes `0`). A `*` followed by a
    /// concrete component is rejected.
    ///
    /// # Errors
    /// Returns [`VersionSyntaxError`] for empty input, empty components,
    /// or components that are not non-negative integers.
    pub fn parse(text: &str) -> Result<Self, VersionSyntaxError> {
        let err = || VersionSyntaxError {
            input: text.to_owned(),
        };
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix(['v', 'V'])
            .unwrap_or(trimmed);
        if body.is_empty() {
            return Err(err());
        }

        let parts: Vec<&str> = body.split('.').collect();
        let concrete = parts
            .iter()
            .rposition(|p| *p != "*")
            .map_or(0, |i| i + 1);
        let mut components = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            if i >= concrete {
                components.push(0);
                continue;
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            components.push(part.parse().map_err(|_| err())?);
        }
        Ok(Self(components))
    }

    /// The numeric components.
    #[must_use]
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Number of components.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Compare component by component, stopping at the shorter version.
    #[must_use]
    pub fn cmp_prefix(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// `true` if this version is strictly newer than `other` on their
    /// common prefix.
    #[must_use]
    pub fn exceeds(&self, other: &Self) -> bool {
        self.cmp_prefix(other) == Ordering::Greater
    }

    /// Dotted form without the leading `v` (`1.0.1`).
    #[must_use]
    pub fn dotted(&self) -> String {
        self.0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.dotted())
    }
}

impl FromStr for Version {
    type Err = VersionSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A string that is not a version at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionSyntaxError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for VersionSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid version", self.input)
    }
}

impl std::error::Error for VersionSyntaxError {}
