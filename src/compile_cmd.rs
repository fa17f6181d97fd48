//! `modmerge compile`: load mods and compile them in one go.

use anyhow::{Context, Result};
use clap::Args;
use modmerge::error::ModMergeError;
use modmerge::merge::{CompileReport, CompileRequest};
use modmerge::model::LoadOrder;
use tracing::info;

use crate::app::App;
use crate::format::OutputFormat;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Mod definition files to load (`ugc_123`, `ugc_123.mod`, or a path)
    pub ids: Vec<String>,

    /// Load the single mod whose name contains this text (repeatable)
    #[arg(short, long = "search", value_name = "QUERY")]
    pub search: Vec<String>,

    /// Base version to compile against (`M.m` or `M.m.p`); newest if omitted
    #[arg(short, long, value_name = "VERSION")]
    pub target: Option<String>,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Shorthand for --format json
    #[arg(long, hide = true, conflicts_with = "format")]
    pub json: bool,
}

pub fn run(app: &mut App, args: &CompileArgs) -> Result<()> {
    let format = OutputFormat::with_json_flag(args.format, args.json);
    let mut load_order = LoadOrder::new();

    for id in &args.ids {
        app.load_id(&mut load_order, id)
            .with_context(|| format!("loading mod '{id}'"))?;
    }
    for query in &args.search {
        let hits = app.search(query)?;
        let hit = match hits.as_slice() {
            [only] => only,
            [] => {
                return Err(ModMergeError::ModResolution {
                    id: query.clone(),
                    reason: "no mod name contains this text".to_owned(),
                }
                .into());
            }
            many => {
                let names: Vec<String> = many.iter().map(|h| format!("\"{}\"", h.name)).collect();
                return Err(ModMergeError::ModResolution {
                    id: query.clone(),
                    reason: format!("{} mods match: {}", many.len(), names.join(", ")),
                }
                .into());
            }
        };
        app.load_definition(&mut load_order, &hit.definition)
            .with_context(|| format!("loading mod \"{}\"", hit.name))?;
    }
    info!(mods = load_order.len(), "load order ready");

    let request = CompileRequest {
        target: args.target.clone(),
        clear: true,
    };
    let report = app.compile(&mut load_order, &request)?;
    print_report(&report, format)
}

/// Print a compile report to stdout.
pub fn print_report(report: &CompileReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", format.serialize(report)?);
        return Ok(());
    }

    for skip in &report.skipped {
        println!("{skip}");
    }
    for upgrade in &report.upgrades {
        println!(
            "Upgraded base {} -> {} ({} conflicts kept from mods, {} taken from the snapshot)",
            upgrade.from,
            upgrade.to,
            upgrade.kept_mod.len(),
            upgrade.took_snapshot.len()
        );
    }
    for o in &report.overrides {
        println!(
            "\"{}\" ({}) overrides {} base file(s):",
            o.name,
            o.version,
            o.paths.len()
        );
        for path in &o.paths {
            println!("  {}", path.display());
        }
    }
    println!(
        "Compiled {} mod(s) for {} into {}",
        report.applied.len(),
        report.target,
        report.output.display()
    );
    for applied in &report.applied {
        println!("  \"{}\" ({})", applied.name, applied.version);
    }
    Ok(())
}
