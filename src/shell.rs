//! `modmerge shell`: an interactive session holding a load order across
//! commands.
//!
//! Each input line is split on whitespace and parsed with clap, so every
//! command gets `--help` and the same error messages as the one-shot CLI.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use modmerge::merge::CompileRequest;
use modmerge::model::{LoadOrder, Mod};
use modmerge::provider::{ModProvider, SearchHit};

use crate::app::App;
use crate::compile_cmd::print_report;
use crate::format::OutputFormat;
use crate::inspect::render_tree;

#[derive(Parser, Debug)]
#[command(
    name = "modmerge",
    no_binary_name = true,
    disable_version_flag = true,
    override_usage = "<COMMAND> [ARGS]"
)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Load a mod; the order of loads is the load order (later mods win)
    Load {
        /// Treat the arguments as text to search for in mod names
        #[arg(short, long)]
        search: bool,

        /// Definition file(s), or the search text with -s
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },

    /// Unload a mod by definition file
    Unload { id: String },

    /// Show the loaded mods
    List {
        /// Include the definition file column
        #[arg(short, long)]
        files: bool,

        /// Include the game version column
        #[arg(short = 'v', long)]
        versions: bool,
    },

    /// Compile every loaded mod into one
    Compile {
        /// Base version to compile against; newest if omitted
        #[arg(short, long, value_name = "VERSION")]
        target: Option<String>,

        /// Unload every mod after a successful compile
        #[arg(short, long)]
        clear: bool,
    },

    /// Unload every mod
    Clear,

    /// Show the known base versions
    Versions,

    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

enum Flow {
    Continue,
    Exit,
}

struct Shell<'a> {
    app: &'a mut App,
    load_order: LoadOrder,
}

/// Run the shell on stdin/stdout until `exit` or end of input.
pub fn run(app: &mut App) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let mut shell = Shell {
        app,
        load_order: LoadOrder::new(),
    };

    writeln!(out, "Type \"help\" for a list of commands.")?;
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = read_line(&mut input)? else {
            writeln!(out)?;
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        match ShellLine::try_parse_from(words) {
            Ok(parsed) => match shell.execute(parsed.command, &mut input, &mut out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) => writeln!(out, "Error: {e:#}")?,
            },
            Err(e) => write!(out, "{}", e.render())?,
        }
        writeln!(out)?;
    }

    shell.load_order.clear()?;
    Ok(())
}

impl Shell<'_> {
    fn execute(
        &mut self,
        command: ShellCommand,
        input: &mut impl BufRead,
        out: &mut impl Write,
    ) -> Result<Flow> {
        match command {
            ShellCommand::Load { search: true, args } => {
                let query = args.join(" ");
                writeln!(out, "Searching for mod...")?;
                let hits = self.app.search(&query)?;
                let picked = match hits.as_slice() {
                    [] => {
                        writeln!(out, "No mod name contains \"{query}\".")?;
                        None
                    }
                    [only] => confirm(only, input, out)?.then_some(only),
                    many => choose(many, input, out)?.map(|i| &many[i]),
                };
                if let Some(hit) = picked {
                    self.load(&hit.definition, out)?;
                }
            }
            ShellCommand::Load {
                search: false,
                args,
            } => {
                for id in &args {
                    let (definition, _) = self.app.provider().resolve_id(id);
                    self.load(&definition, out)?;
                }
            }
            ShellCommand::Unload { id } => {
                let (_, key) = self.app.provider().resolve_id(&id);
                let name = self.load_order.get(&key).map(|m| m.name().to_owned());
                if self.load_order.remove(&key)? {
                    writeln!(out, "Unloaded \"{}\".", name.unwrap_or_default())?;
                } else {
                    writeln!(out, "No loaded mod matches '{id}'.")?;
                }
            }
            ShellCommand::List { files, versions } => {
                write!(out, "{}", render_table(&self.load_order, files, versions))?;
            }
            ShellCommand::Compile { target, clear } => {
                let request = CompileRequest { target, clear };
                let report = self.app.compile(&mut self.load_order, &request)?;
                print_report(&report, OutputFormat::Text)?;
                if clear {
                    writeln!(out, "Unloaded all mods.")?;
                }
            }
            ShellCommand::Clear => {
                self.load_order.clear()?;
                writeln!(out, "Unloaded all mods.")?;
            }
            ShellCommand::Versions => {
                write!(out, "{}", render_tree(self.app.registry()?))?;
            }
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn load(&mut self, definition: &std::path::Path, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Loading \"{}\"...", definition.display())?;
        if self.app.load_definition(&mut self.load_order, definition)? {
            writeln!(out, "Mod loaded.")?;
        } else {
            writeln!(out, "That mod is already loaded.")?;
        }
        Ok(())
    }
}

fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Ask whether the only search hit is the one meant. End of input is "no".
fn confirm(hit: &SearchHit, input: &mut impl BufRead, out: &mut impl Write) -> io::Result<bool> {
    write!(out, "Are you searching for \"{}\"? (y/n): ", hit.name)?;
    loop {
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(false);
        };
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => write!(out, "Please answer y or n: ")?,
        }
    }
}

/// Numbered choice among several hits. `None` when the user types `exit`
/// or input ends.
fn choose(
    hits: &[SearchHit],
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<Option<usize>> {
    writeln!(out, "Found {} candidate mods.\n", hits.len())?;
    for (i, hit) in hits.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, hit.name)?;
    }
    write!(
        out,
        "\nNumber of the mod to load, or \"exit\" to abort this load: "
    )?;
    loop {
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        let answer = line.trim();
        if answer.eq_ignore_ascii_case("exit") {
            writeln!(out, "Aborting load.")?;
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=hits.len()).contains(&n) => return Ok(Some(n - 1)),
            Ok(_) => write!(
                out,
                "Please give a number in the range [1, {}] or \"exit\": ",
                hits.len()
            )?,
            Err(_) => write!(out, "Please give a number or \"exit\": ")?,
        }
    }
}

/// The `list` table, in load order. Columns: definition file (with
/// `files`), name, game version (with `versions`).
fn render_table(load_order: &LoadOrder, files: bool, versions: bool) -> String {
    const FILE_HEAD: &str = "MOD FILE";
    const NAME_HEAD: &str = "MOD NAME";
    const VERSION_HEAD: &str = "GAME VERSION";

    if load_order.is_empty() {
        return "No mods have been loaded.\n".to_owned();
    }

    let rows: Vec<[String; 3]> = load_order
        .iter()
        .map(|m: &Mod| [m.file_name(), m.name().to_owned(), m.version().to_string()])
        .collect();
    let width = |col: usize, head: &str| {
        rows.iter()
            .map(|r| r[col].chars().count())
            .chain([head.len()])
            .max()
            .unwrap_or(0)
    };
    let (fw, nw, vw) = (width(0, FILE_HEAD), width(1, NAME_HEAD), width(2, VERSION_HEAD));

    let line = |file: &str, name: &str, version: &str| {
        let mut s = String::new();
        if files {
            let _ = write!(s, "{file:<fw$} | ");
        }
        let _ = write!(s, "{name:<nw$}");
        if versions {
            let _ = write!(s, " | {version:<vw$}");
        }
        s.trim_end().to_owned()
    };

    let mut out = line(FILE_HEAD, NAME_HEAD, VERSION_HEAD);
    let rule = nw + if files { fw + 3 } else { 0 } + if versions { vw + 3 } else { 0 };
    out.push('\n');
    out.push_str(&"-".repeat(rule));
    out.push('\n');
    for [file, name, version] in &rows {
        out.push_str(&line(file, name, version));
        out.push('\n');
    }
    out
}
