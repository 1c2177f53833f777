//! Error types for configuration loading and decoding.
//!
//! Responsibilities:
//! - Define error variants for config file discovery, reading, parsing, and decoding.
//! - Let callers tell "no config file" apart from every other failure.
//!
//! Does NOT handle:
//! - Key-path walking (the walker cannot fail).
//! - Logging or reporting; errors are returned to the caller untouched.
//!
//! Invariants:
//! - Every file-related variant carries the path (or search locations) involved.
//! - `ConfigFileNotFound` is the only variant the orchestrator treats as non-fatal.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::Format;

/// Boxed parser error from whichever format library produced it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while loading or decoding configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file \"{name}\" not found in {locations:?}")]
    ConfigFileNotFound {
        name: String,
        locations: Vec<PathBuf>,
    },

    #[error("Unsupported config type \"{0}\"")]
    UnsupportedConfigType(String),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {source}")]
    ConfigFileParse {
        path: PathBuf,
        format: Format,
        #[source]
        source: BoxError,
    },

    #[error("Config at {path} must contain a map at its root")]
    InvalidConfigRoot { path: PathBuf },

    #[error("Failed to decode configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error only means that no config file was found or configured.
    pub fn is_config_file_not_found(&self) -> bool {
        matches!(self, Error::ConfigFileNotFound { .. })
    }
}
