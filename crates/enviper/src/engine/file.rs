//! Config file discovery and parsing.
//!
//! Responsibilities:
//! - Map file extensions to supported formats.
//! - Search configured directories for `<name>.<ext>`.
//! - Parse file contents into an untyped map layer.
//! - Resolve `$HOME`-relative and relative search paths using `directories`.
//!
//! Does NOT handle:
//! - Merging the file layer with other layers (see `layered.rs`).
//! - Decoding into typed targets.
//!
//! Invariants:
//! - Extensions are tried in `Format::EXTENSIONS` order within each directory,
//!   directories in the order they were added.
//! - An empty document is an empty layer; any other non-map root is rejected.
//! - Dotenv keys containing `.` nest; dotenv values are always strings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};

use super::tree;
use crate::error::{BoxError, Error, Result};

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Toml,
    Yaml,
    Dotenv,
}

impl Format {
    /// Extensions searched for, in order.
    pub const EXTENSIONS: &'static [&'static str] =
        &["json", "toml", "yaml", "yml", "env", "dotenv"];

    /// Format for a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            "yaml" | "yml" => Ok(Format::Yaml),
            "env" | "dotenv" => Ok(Format::Dotenv),
            _ => Err(Error::UnsupportedConfigType(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Toml => "toml",
            Format::Yaml => "yaml",
            Format::Dotenv => "dotenv",
        })
    }
}

/// Parse `contents` into a document tree.
fn parse_document(contents: &str, format: Format) -> std::result::Result<Value, BoxError> {
    let value: Value = match format {
        Format::Json => serde_json::from_str(contents)?,
        Format::Toml => toml::from_str(contents)?,
        Format::Yaml => serde_yaml::from_str(contents)?,
        Format::Dotenv => {
            let mut map = Map::new();
            for item in dotenvy::from_read_iter(contents.as_bytes()) {
                let (key, value) = item?;
                tree::set_path(&mut map, &key, Value::String(value));
            }
            Value::Object(map)
        }
    };
    Ok(value)
}

/// Parse `contents` read from `path` into a file layer.
pub(crate) fn parse_layer(
    contents: &str,
    format: Format,
    path: &Path,
) -> Result<Map<String, Value>> {
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    match parse_document(contents, format) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(Error::InvalidConfigRoot {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(Error::ConfigFileParse {
            path: path.to_path_buf(),
            format,
            source,
        }),
    }
}

/// Find `<name>.<ext>` in `dirs`. When `config_type` is set, a bare `<name>` also matches.
pub(crate) fn search(dirs: &[PathBuf], name: &str, config_type: Option<Format>) -> Option<PathBuf> {
    for dir in dirs {
        for ext in Format::EXTENSIONS {
            let candidate = dir.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if config_type.is_some() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Resolve a leading `$HOME` and make the path absolute against the working directory.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("$HOME") {
        Ok(rest) => match directories::BaseDirs::new() {
            Some(base) => base.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    if expanded.is_absolute() {
        return expanded;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&expanded))
        .unwrap_or(expanded)
}
