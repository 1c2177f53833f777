//! Tests for the layered engine.
//!
//! Responsibilities:
//! - Test config file discovery and loading through `Engine::read_in_config`.
//! - Test environment bindings, prefixes, replacers and precedence.
//! - Test decoding options (tag names, zero fields).
//!
//! Invariants:
//! - Tests touching the process environment use `serial_test` and `temp_env`.
//! - Temporary directories are cleaned up automatically via `tempfile`.

use serde::{Deserialize, Serialize};

use crate::Describe;


#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Describe)]
pub struct Bar {
    #[serde(rename = "baz")]
    pub baz_value: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Describe)]
#[serde(default)]
pub struct Sample {
    pub foo: String,
    pub bar: Bar,
    pub enabled: bool,
    pub tags: Vec<String>,
}
