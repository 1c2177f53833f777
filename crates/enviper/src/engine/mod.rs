//! Source-merging engine.
//!
//! Responsibilities:
//! - Define the `Engine` contract the orchestrator drives.
//! - Provide `Layered`, a file + env + defaults engine decoding through serde.
//! - Carry per-call decode options.
//!
//! Does NOT handle:
//! - Deciding which keys to bind from the environment (see `walk.rs`).
//! - The two-pass unmarshal protocol (see `orchestrator.rs`).
//!
//! Invariants / Assumptions:
//! - Bound environment variables take precedence over config file values.
//! - Environment bindings are additive; nothing ever removes one.

mod env;
mod file;
mod layered;
mod tree;

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::shape::{Describe, Kind};
use crate::walk::DEFAULT_TAG_NAME;

pub use env::{KeyReplacer, env_var_or_none};
pub use file::Format;
pub use layered::Layered;

/// Operations a source-merging engine must offer for override-correct unmarshaling.
pub trait Engine {
    /// Load the configured config file into the file layer.
    ///
    /// Returns `Error::ConfigFileNotFound` when no file is configured or found.
    fn read_in_config(&mut self) -> Result<()>;

    /// Decode all layers into `target`, overwriting it in place.
    fn unmarshal<T>(&self, target: &mut T, options: &DecodeOptions) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Describe;

    /// Register `key` as a recognized environment lookup. Empty keys are ignored.
    fn bind_env(&mut self, key: &str, kind: Kind);

    /// Set the rewrite rule applied to environment variable names before lookup.
    fn set_env_key_replacer(&mut self, replacer: KeyReplacer);
}

/// Knobs passed through to a decode pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    tag_name: Option<String>,
    zero_fields: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read keys by the names given under this tag instead of serde's.
    pub fn with_tag_name(mut self, name: impl Into<String>) -> Self {
        self.tag_name = Some(name.into());
        self
    }

    /// Decode from the sources alone, ignoring the target's current values.
    pub fn with_zero_fields(mut self, zero: bool) -> Self {
        self.zero_fields = zero;
        self
    }

    pub fn tag_name(&self) -> &str {
        self.tag_name.as_deref().unwrap_or(DEFAULT_TAG_NAME)
    }

    pub fn zero_fields(&self) -> bool {
        self.zero_fields
    }
}
