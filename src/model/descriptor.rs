//! Mod definition (`.mod`) files.
//!
//! A definition is a list of `key = "value"` assignments in the game's
//! script syntax. Only the first occurrence of each key the tool cares about
//! is read; values are C-style quoted strings with backslash escapes.

use std::sync::LazyLock;

use regex::Regex;

/// File extension of mod definition files, without the dot.
pub const DEFINITION_EXTENSION: &str = "mod";

/// The fields of a definition file the tool uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModDescriptor {
    pub name: Option<String>,
    pub supported_version: Option<String>,
    /// Directory holding loose mod files.
    pub path: Option<String>,
    /// Zip archive holding the mod files.
    pub archive: Option<String>,
}

impl ModDescriptor {
    /// Read the known keys out of definition text. Unknown keys are
    /// ignored; missing keys stay `None`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?m)^\s*(name|supported_version|path|archive)\s*=")
                .expect("static regex must compile")
        });

        let mut desc = Self::default();
        for caps in KEY_RE.captures_iter(text) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let slot = match key.as_str() {
                "name" => &mut desc.name,
                "supported_version" => &mut desc.supported_version,
                "path" => &mut desc.path,
                _ => &mut desc.archive,
            };
            if slot.is_none() {
                *slot = Some(read_quoted(&text[whole.end()..]).trim().to_owned());
            }
        }
        desc
    }
}

/// Read the value starting at `text`: a double-quoted string with
/// backslash escapes, or a bare word up to the end of the line. An
/// unterminated string runs to the end of `text`.
fn read_quoted(text: &str) -> String {
    let rest = text.trim_start_matches([' ', '\t']);
    let Some(quoted) = rest.strip_prefix('"') else {
        return rest.lines().next().unwrap_or_default().to_owned();
    };
    let mut out = String::new();
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => break,
            _ => out.push(c),
        }
    }
    out
}
