// bndl-common/src/brewfile.rs
//! Reads the Brewfile manifest: one `directive "name", options...` per line.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{BndlError, Result};

pub const BREWFILE_NAME: &str = "Brewfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Tap,
    Brew,
    Cask,
    Mas,
    Whalebrew,
    Vscode,
}

impl EntryKind {
    fn from_directive(directive: &str) -> Option<Self> {
        match directive {
            "tap" => Some(Self::Tap),
            "brew" => Some(Self::Brew),
            "cask" => Some(Self::Cask),
            "mas" => Some(Self::Mas),
            "whalebrew" => Some(Self::Whalebrew),
            "vscode" => Some(Self::Vscode),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tap => "tap",
            Self::Brew => "brew",
            Self::Cask => "cask",
            Self::Mas => "mas",
            Self::Whalebrew => "whalebrew",
            Self::Vscode => "vscode",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    /// Everything after the name, verbatim (e.g. `args: ["with-foo"]`).
    pub options: Option<String>,
}

/// Where the Brewfile is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrewfileSource {
    Path(PathBuf),
    Stdin,
}

impl BrewfileSource {
    pub fn display_path(&self) -> PathBuf {
        match self {
            Self::Path(p) => p.clone(),
            Self::Stdin => PathBuf::from("-"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Brewfile {
    pub path: PathBuf,
    pub entries: Vec<Entry>,
}

impl Brewfile {
    /// Resolves which Brewfile to use. `--global` and `--file` are exclusive.
    pub fn locate(
        config: &Config,
        global: bool,
        file: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<BrewfileSource> {
        let env_value = |key: &str| env.get(key).filter(|v| !v.is_empty());

        if global {
            if file.is_some() {
                return Err(BndlError::Usage(
                    "`--file` and `--global` cannot be used together.".to_string(),
                ));
            }
            if let Some(path) = env_value("HOMEBREW_BUNDLE_FILE_GLOBAL") {
                return Ok(BrewfileSource::Path(PathBuf::from(path)));
            }
            let dotdir = config.home_dir().join(".homebrew").join(BREWFILE_NAME);
            if dotdir.is_file() {
                return Ok(BrewfileSource::Path(dotdir));
            }
            return Ok(BrewfileSource::Path(config.home_dir().join(".Brewfile")));
        }

        if let Some(file) = file {
            if file == "-" {
                return Ok(BrewfileSource::Stdin);
            }
            return Ok(BrewfileSource::Path(PathBuf::from(file)));
        }

        if let Some(path) = env_value("HOMEBREW_BUNDLE_FILE") {
            return Ok(BrewfileSource::Path(PathBuf::from(path)));
        }

        Ok(BrewfileSource::Path(PathBuf::from(BREWFILE_NAME)))
    }

    pub fn read(
        config: &Config,
        global: bool,
        file: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let source = Self::locate(config, global, file, env)?;
        debug!("Reading Brewfile from {}", source.display_path().display());
        let contents = match &source {
            BrewfileSource::Path(path) => fs::read_to_string(path).map_err(|e| {
                BndlError::NotFound(format!("Brewfile {}: {e}", path.display()))
            })?,
            BrewfileSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            }
        };
        Self::parse(&source.display_path(), &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (idx, raw_line) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let directive_len = line
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(line.len());
            let directive = &line[..directive_len];

            if directive == "cask_args" {
                continue;
            }

            let Some(kind) = EntryKind::from_directive(directive) else {
                warn!(
                    "Skipping unsupported Brewfile line {}:{}: {}",
                    path.display(),
                    line_no,
                    line
                );
                continue;
            };

            let (name, options) =
                parse_arguments(&line[directive_len..]).ok_or_else(|| BndlError::Brewfile {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: format!("`{kind}` expects a quoted name"),
                })?;

            entries.push(Entry {
                kind,
                name,
                options,
            });
        }

        debug!(
            "Parsed {} entries from Brewfile {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Names of `brew` entries in file order, first occurrence wins.
    pub fn brews(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Brew)
            .map(|e| e.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Splits `"name", key: value` (optionally wrapped in parentheses).
fn parse_arguments(rest: &str) -> Option<(String, Option<String>)> {
    let mut rest = rest.trim_start();
    let parenthesized = rest.starts_with('(');
    if parenthesized {
        rest = rest[1..].trim_start();
    }

    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let tail = &rest[1..];
    let end = tail.find(quote)?;
    let name = &tail[..end];
    if name.is_empty() {
        return None;
    }

    let mut remainder = tail[end + 1..].trim();
    if parenthesized {
        remainder = remainder.strip_suffix(')').unwrap_or(remainder).trim_end();
    }
    let remainder = remainder.strip_prefix(',').unwrap_or(remainder).trim();
    let options = (!remainder.is_empty()).then(|| remainder.to_string());

    Some((name.to_string(), options))
}
