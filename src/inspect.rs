//! Read-only commands: `versions`, `search`, `conflicts`.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use modmerge::error::ModMergeError;
use modmerge::merge::Session;
use modmerge::provider::ModProvider;
use modmerge::registry::{Registry, VersionComponent};
use modmerge::version::Version;
use serde::Serialize;

use crate::app::App;
use crate::format::OutputFormat;

#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Print only the newest base version
    #[arg(long)]
    pub latest: bool,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for in mod names (case-insensitive)
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
pub struct ConflictsArgs {
    /// Mod definition to check (`ugc_123`, `ugc_123.mod`, or a path)
    pub id: String,

    /// Base version to check against; the mod's own version if omitted
    #[arg(short, long, value_name = "VERSION")]
    pub target: Option<String>,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

// ---------------------------------------------------------------------------
// versions
// ---------------------------------------------------------------------------

/// Indented tree of every known base version.
pub fn render_tree(registry: &Registry) -> String {
    let mut out = String::new();
    let mut last: Option<(u32, u32)> = None;
    for v in registry.iter() {
        if last.map(|(main, _)| main) != Some(v.main) {
            let _ = writeln!(out, "v{}", v.main);
        }
        if last != Some((v.main, v.major)) {
            let _ = writeln!(out, "  v{}.{}", v.main, v.major);
        }
        let _ = writeln!(out, "    {v}");
        last = Some((v.main, v.major));
    }
    out
}

pub fn versions(app: &mut App, args: &VersionsArgs) -> Result<()> {
    let format = args.format.unwrap_or_default();
    let registry = app.registry()?;
    match (format, args.latest) {
        (OutputFormat::Json, true) => println!("{}", format.serialize(&registry.latest())?),
        (OutputFormat::Json, false) => {
            let all: Vec<Version> = registry.iter().map(|&v| v.into()).collect();
            println!("{}", format.serialize(&all)?);
        }
        (OutputFormat::Text, true) => println!("{}", registry.latest()),
        (OutputFormat::Text, false) => print!("{}", render_tree(registry)),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRow {
    name: String,
    definition: PathBuf,
}

pub fn search(app: &App, args: &SearchArgs) -> Result<()> {
    let query = args.query.join(" ");
    let hits = app.search(&query)?;
    let format = args.format.unwrap_or_default();
    if format == OutputFormat::Json {
        let rows: Vec<SearchRow> = hits
            .into_iter()
            .map(|h| SearchRow {
                name: h.name,
                definition: h.definition,
            })
            .collect();
        println!("{}", format.serialize(&rows)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No mod name contains \"{query}\".");
        return Ok(());
    }
    for hit in &hits {
        let file = hit
            .definition
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{file:<24} {}", hit.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// conflicts
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OverlapReport {
    name: String,
    version: Version,
    base: Version,
    paths: Vec<PathBuf>,
}

pub fn conflicts(app: &mut App, args: &ConflictsArgs) -> Result<()> {
    let format = args.format.unwrap_or_default();
    let (definition, _) = app.provider().resolve_id(&args.id);
    let loaded = app
        .provider()
        .load(&definition)
        .with_context(|| format!("loading mod '{}'", args.id))?;

    let registry = app.registry()?;
    let version = match &args.target {
        Some(text) => registry.validate_version_string(text)?,
        None => loaded.version().clone(),
    };
    let unknown = |component| ModMergeError::UnknownVersion {
        version: version.dotted(),
        component,
        required_by: Some(loaded.name().to_owned()),
    };
    registry.check(&version).map_err(unknown)?;
    let base = registry
        .resolve_snapshot(&version)
        .ok_or_else(|| unknown(VersionComponent::Minor))?;

    let merge = &app.config().merge;
    let session = Session::open(
        app.substrate(),
        app.git_work(),
        base,
        merge.signature(),
        &merge.mergeable_extensions,
    )?;
    let paths = session.overlaps(&loaded)?;
    session.discard()?;

    let report = OverlapReport {
        name: loaded.name().to_owned(),
        version: loaded.version().clone(),
        base: base.into(),
        paths,
    };
    loaded.release()?;

    if format == OutputFormat::Json {
        println!("{}", format.serialize(&report)?);
    } else if report.paths.is_empty() {
        println!(
            "\"{}\" ({}) overrides no files of {}",
            report.name, report.version, report.base
        );
    } else {
        println!(
            "\"{}\" ({}) overrides {} file(s) of {}:",
            report.name,
            report.version,
            report.paths.len(),
            report.base
        );
        for path in &report.paths {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_groups_by_level() {
        let registry = Registry::parse("1\n\t0\n\t\t0\n\t\t1\n\t1\n\t\t0\n2\n\t0\n\t\t0\n").unwrap();
        let tree = render_tree(&registry);
        assert_eq!(
            tree,
            "v1\n  v1.0\n    v1.0.0\n    v1.0.1\n  v1.1\n    v1.1.0\nv2\n  v2.0\n    v2.0.0\n"
        );
    }
}
