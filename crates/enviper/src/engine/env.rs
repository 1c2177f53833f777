//! Environment variable lookup for bound keys.
//!
//! Responsibilities:
//! - Read environment variables with empty/whitespace filtering.
//! - Rewrite variable names with a `KeyReplacer`.
//! - Coerce raw strings into typed tree values according to a leaf's `Kind`.
//!
//! Does NOT handle:
//! - Deciding which keys are bound (see `layered.rs` and `walk.rs`).
//! - Decoding into the target type (see `layered.rs`).
//!
//! Invariants:
//! - `env_var_or_none` treats empty or whitespace-only variables as unset and trims values.
//!   Bound keys are read raw instead (see `Layered::allow_empty_env`).
//! - Coercion never fails; unparseable text is kept as a string for the decoder to reject.

use serde_json::{Number, Value};

use crate::shape::{Kind, Scalar};

/// Read an environment variable, returning None if unset, empty, or whitespace-only.
/// Returns the trimmed value (leading/trailing whitespace removed) if present.
pub fn env_var_or_none(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == s.len() {
            // No trimming needed, return original to avoid allocation
            Some(s)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Ordered list of substring replacements applied to environment variable names.
///
/// At each position the first matching pair wins and scanning resumes after the
/// replaced text, so replacements never apply to their own output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyReplacer {
    pairs: Vec<(String, String)>,
}

impl KeyReplacer {
    /// Build a replacer from `(from, to)` pairs. Pairs with an empty `from` are dropped.
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .filter(|(from, _)| !from.is_empty())
                .collect(),
        }
    }

    pub fn replace(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        'scan: while !rest.is_empty() {
            for (from, to) in &self.pairs {
                if let Some(tail) = rest.strip_prefix(from.as_str()) {
                    out.push_str(to);
                    rest = tail;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        }
        out
    }
}

/// Convert a raw environment string into a tree value for a leaf of `kind`.
pub(crate) fn coerce(raw: &str, kind: Kind) -> Value {
    match kind {
        Kind::Scalar(scalar) => coerce_scalar(raw, scalar),
        Kind::List(scalar) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| coerce_scalar(item, scalar))
                .collect(),
        ),
    }
}

/// Surrounding whitespace is ignored when parsing; strings keep it.
fn coerce_scalar(raw: &str, scalar: Scalar) -> Value {
    let text = raw.trim();
    let parsed = match scalar {
        Scalar::Bool => parse_bool(text).map(Value::Bool),
        Scalar::Int => text.parse::<i64>().ok().map(Value::from),
        Scalar::Uint => text.parse::<u64>().ok().map(Value::from),
        Scalar::Float => parse_float(text),
        Scalar::Str => None,
        Scalar::Any => text
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| parse_float(text))
            .or_else(|| match text {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            }),
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_owned()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

fn parse_float(raw: &str) -> Option<Value> {
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
