//! Layered configuration engine.
//!
//! Responsibilities:
//! - Hold config file search settings, defaults, explicit overrides and env bindings.
//! - Merge layers by precedence into one untyped tree.
//! - Decode the tree onto a typed target through serde.
//!
//! Does NOT handle:
//! - Discovering which keys exist in a target type (see `walk.rs`).
//! - Swallowing missing-file errors (the caller decides; see `orchestrator.rs`).
//!
//! Invariants / Assumptions:
//! - Precedence, highest first: `set` overrides, bound env vars, config file,
//!   `set_default` defaults, the target's current value.
//! - When decoding, layer keys match field names regardless of ASCII case;
//!   map keys and `get`/`set` lookups stay case-sensitive.
//! - Env variable names are upper-cased `PREFIX_KEY` with the key replacer applied.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::env::{KeyReplacer, coerce};
use super::file::{self, Format};
use super::tree;
use super::{DecodeOptions, Engine};
use crate::error::{Error, Result};
use crate::shape::{Describe, Kind, Scalar, Shape};
use crate::walk::DEFAULT_TAG_NAME;

const DEFAULT_CONFIG_NAME: &str = "config";

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvBinding {
    kind: Kind,
    /// Explicit variable names; empty means derive from prefix and key.
    names: Vec<String>,
}

/// Configuration engine merging a config file, environment variables, defaults and overrides.
#[derive(Debug, Clone)]
pub struct Layered {
    config_paths: Vec<PathBuf>,
    config_name: String,
    config_type: Option<Format>,
    config_file: Option<PathBuf>,
    config_file_used: Option<PathBuf>,
    file_layer: Map<String, Value>,
    file_format: Option<Format>,
    defaults: Map<String, Value>,
    overrides: Map<String, Value>,
    env_prefix: Option<String>,
    env_key_replacer: Option<KeyReplacer>,
    allow_empty_env: bool,
    env_bindings: BTreeMap<String, EnvBinding>,
}

impl Default for Layered {
    fn default() -> Self {
        Self::new()
    }
}

impl Layered {
    /// Create an engine with no sources configured.
    pub fn new() -> Self {
        Self {
            config_paths: Vec::new(),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            config_type: None,
            config_file: None,
            config_file_used: None,
            file_layer: Map::new(),
            file_format: None,
            defaults: Map::new(),
            overrides: Map::new(),
            env_prefix: None,
            env_key_replacer: None,
            allow_empty_env: false,
            env_bindings: BTreeMap::new(),
        }
    }

    /// Add a directory to search for the config file. `$HOME` is expanded.
    pub fn add_config_path(&mut self, path: impl AsRef<Path>) {
        let path = file::absolutize(path.as_ref());
        if !self.config_paths.contains(&path) {
            debug!(path = %path.display(), "adding config search path");
            self.config_paths.push(path);
        }
    }

    /// Set the config file name searched for, without extension.
    pub fn set_config_name(&mut self, name: impl Into<String>) {
        self.config_name = name.into();
        self.config_file = None;
    }

    /// Force the config format instead of inferring it from the extension.
    pub fn set_config_type(&mut self, format: Format) {
        self.config_type = Some(format);
    }

    /// Use an explicit config file, bypassing the search paths.
    ///
    /// A missing explicit file is a read error, not "not found".
    pub fn set_config_file(&mut self, path: impl AsRef<Path>) {
        self.config_file = Some(file::absolutize(path.as_ref()));
    }

    /// Path of the config file loaded by the last successful `read_in_config`.
    pub fn config_file_used(&self) -> Option<&Path> {
        self.config_file_used.as_deref()
    }

    /// Load the file layer from a reader instead of the filesystem.
    pub fn read_config<R: Read>(&mut self, mut reader: R, format: Format) -> Result<()> {
        let path = PathBuf::from("<reader>");
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|source| Error::ConfigFileRead {
                path: path.clone(),
                source,
            })?;
        self.file_layer = file::parse_layer(&contents, format, &path)?;
        self.file_format = Some(format);
        Ok(())
    }

    /// Set the prefix prepended (with `_`) to derived environment variable names.
    pub fn set_env_prefix(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        self.env_prefix = (!prefix.is_empty()).then_some(prefix);
    }

    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Treat set-but-empty environment variables as values instead of unset.
    ///
    /// Values are used as read; whitespace-only values are never treated as
    /// unset. Non-string leaves ignore surrounding whitespace when coerced.
    pub fn allow_empty_env(&mut self, allow: bool) {
        self.allow_empty_env = allow;
    }

    /// Bind `key` to explicit environment variable names, tried in order.
    pub fn bind_env_names<I, S>(&mut self, key: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if key.is_empty() {
            return;
        }
        let binding = self
            .env_bindings
            .entry(key.to_string())
            .or_insert_with(|| EnvBinding {
                kind: Kind::Scalar(Scalar::Any),
                names: Vec::new(),
            });
        binding.names = names.into_iter().map(Into::into).collect();
    }

    /// Whether `key` is registered for environment lookup.
    pub fn is_env_bound(&self, key: &str) -> bool {
        self.env_bindings.contains_key(key)
    }

    /// Set a default for `key`, the lowest-precedence source.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        tree::set_path(&mut self.defaults, key, value.into());
    }

    /// Set an override for `key`, the highest-precedence source.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        tree::set_path(&mut self.overrides, key, value.into());
    }

    /// Merged value for `key` across all layers.
    pub fn get(&self, key: &str) -> Option<Value> {
        let merged = self.merged_sources();
        tree::get_path(&merged, key).cloned()
    }

    /// Whether any layer provides a value for `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every merged setting as one map.
    pub fn all_settings(&self) -> Map<String, Value> {
        self.merged_sources()
    }

    /// Environment variable name derived for `key`, before replacement.
    fn env_name(&self, key: &str) -> String {
        match &self.env_prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key.to_string(),
        }
        .to_uppercase()
    }

    fn lookup_env(&self, name: &str) -> Option<String> {
        let name = match &self.env_key_replacer {
            Some(replacer) => replacer.replace(name),
            None => name.to_string(),
        };
        let value = std::env::var(&name).ok()?;
        (self.allow_empty_env || !value.is_empty()).then_some(value)
    }

    fn env_layer(&self) -> Map<String, Value> {
        let mut layer = Map::new();
        for (key, binding) in &self.env_bindings {
            let raw = if binding.names.is_empty() {
                self.lookup_env(&self.env_name(key))
            } else {
                binding.names.iter().find_map(|name| self.lookup_env(name))
            };
            if let Some(raw) = raw {
                tree::set_path(&mut layer, key, coerce(&raw, binding.kind));
            }
        }
        layer
    }

    fn merged_sources(&self) -> Map<String, Value> {
        let mut merged = self.defaults.clone();
        tree::merge_maps(&mut merged, self.file_layer.clone());
        tree::merge_maps(&mut merged, self.env_layer());
        tree::merge_maps(&mut merged, self.overrides.clone());
        merged
    }

    /// Layers merged for decoding into `shape`, keyed by the names under `tag_name`.
    ///
    /// Each layer's keys are matched to field names ignoring ASCII case before
    /// merging, so an exactly spelled key in a higher layer still wins.
    fn sources_for(&self, shape: &Shape, tag_name: &str) -> Map<String, Value> {
        let mut file_layer = self.file_layer.clone();
        tree::fold_case(&mut file_layer, shape, tag_name);
        if self.file_format == Some(Format::Dotenv) {
            tree::coerce_strings(&mut file_layer, shape, tag_name);
        }

        let mut merged = self.defaults.clone();
        tree::fold_case(&mut merged, shape, tag_name);
        tree::merge_maps(&mut merged, file_layer);
        tree::merge_maps(&mut merged, self.env_layer());
        let mut overrides = self.overrides.clone();
        tree::fold_case(&mut overrides, shape, tag_name);
        tree::merge_maps(&mut merged, overrides);
        merged
    }

    fn find_config_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_file {
            return Ok(path.clone());
        }
        file::search(&self.config_paths, &self.config_name, self.config_type).ok_or_else(|| {
            Error::ConfigFileNotFound {
                name: self.config_name.clone(),
                locations: self.config_paths.clone(),
            }
        })
    }
}

impl Engine for Layered {
    fn read_in_config(&mut self) -> Result<()> {
        let path = self.find_config_file()?;
        let format = match self.config_type {
            Some(format) => format,
            None => Format::from_path(&path)?,
        };
        let contents = fs::read_to_string(&path).map_err(|source| Error::ConfigFileRead {
            path: path.clone(),
            source,
        })?;
        self.file_layer = file::parse_layer(&contents, format, &path)?;
        self.file_format = Some(format);
        debug!(path = %path.display(), %format, "loaded config file");
        self.config_file_used = Some(path);
        Ok(())
    }

    fn unmarshal<T>(&self, target: &mut T, options: &DecodeOptions) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Describe,
    {
        let shape = target.describe();
        let mut sources = self.sources_for(&shape, options.tag_name());
        if options.tag_name() != DEFAULT_TAG_NAME {
            tree::rekey(&mut sources, &shape, options.tag_name());
        }

        let merged = if options.zero_fields() {
            Value::Object(sources)
        } else {
            let mut base = serde_json::to_value(&*target)?;
            tree::merge(&mut base, Value::Object(sources));
            base
        };
        *target = serde_json::from_value(merged)?;
        Ok(())
    }

    fn bind_env(&mut self, key: &str, kind: Kind) {
        if key.is_empty() {
            return;
        }
        self.env_bindings
            .entry(key.to_string())
            .and_modify(|binding| binding.kind = kind)
            .or_insert_with(|| EnvBinding {
                kind,
                names: Vec::new(),
            });
    }

    fn set_env_key_replacer(&mut self, replacer: KeyReplacer) {
        self.env_key_replacer = Some(replacer);
    }
}
