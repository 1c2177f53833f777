//! Key-path walker.
//!
//! Responsibilities:
//! - Resolve each struct field's tag under the active tag name into a directive.
//! - Recursively derive one dotted key path per reachable leaf of a shape.
//!
//! Does NOT handle:
//! - Registering the paths with an engine (see `orchestrator.rs`).
//! - Turning a key path into an environment variable name (see `engine/env.rs`).
//!
//! Invariants:
//! - Squashed fields add no segment; skipped fields add nothing at all.
//! - Skip takes precedence over squash.
//! - The walk never fails; unusual shapes simply yield fewer paths.

use std::fmt;

use crate::shape::{Field, Kind, Shape};

/// Tag consulted when no other tag name is configured.
pub const DEFAULT_TAG_NAME: &str = "serde";

/// Dotted path to one leaf, plus the leaf's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<String>,
    kind: Kind,
}

impl KeyPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Segments joined with `.`.
    pub fn key(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// How a field takes part in the key namespace under one tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    Skip,
    Squash,
    Named(&'static str),
}

/// Parse the field's `name[,directive...]` tag, falling back to the declared name.
pub(crate) fn resolve(field: &Field, tag_name: &str) -> Directive {
    let Some(tag) = field.tags.lookup(tag_name) else {
        return Directive::Named(field.ident);
    };

    let mut parts = tag.split(',');
    let name = parts.next().unwrap_or_default().trim();
    if name == "-" {
        return Directive::Skip;
    }
    if parts.any(|directive| directive.trim() == "squash") {
        return Directive::Squash;
    }
    if name.is_empty() {
        Directive::Named(field.ident)
    } else {
        Directive::Named(name)
    }
}

/// Derive every key path reachable from `shape`, reading tags named `tag_name`.
pub fn walk(shape: &Shape, tag_name: &str) -> Vec<KeyPath> {
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    walk_into(shape, tag_name, &mut prefix, &mut paths);
    paths
}

fn walk_into(shape: &Shape, tag_name: &str, prefix: &mut Vec<String>, out: &mut Vec<KeyPath>) {
    match shape {
        Shape::Struct(fields) => {
            for field in fields {
                match resolve(field, tag_name) {
                    Directive::Skip => {}
                    Directive::Squash => walk_into(&field.shape, tag_name, prefix, out),
                    Directive::Named(name) => {
                        prefix.push(name.to_owned());
                        walk_into(&field.shape, tag_name, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }
        Shape::Map(entries) => {
            for entry in entries {
                let Some(key) = &entry.key else {
                    continue;
                };
                prefix.push(key.clone());
                walk_into(&entry.shape, tag_name, prefix, out);
                prefix.pop();
            }
        }
        Shape::Leaf(kind) => out.push(KeyPath {
            segments: prefix.clone(),
            kind: *kind,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::marker::PhantomData;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::Describe;
    use crate::shape::{Scalar, Tags};

    #[derive(Debug, Default, Serialize, Deserialize, Describe)]
    struct PtrTest {
        value: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Describe)]
    struct Qux {
        quuux: bool,
        quuux_ptr: Option<PtrTest>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Describe)]
    struct Bar {
        #[serde(rename = "baz")]
        baz_value: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Describe)]
    struct Config {
        foo: String,
        foo_ptr: Option<PtrTest>,
        bar: Bar,
        qux_map: BTreeMap<String, Qux>,
        #[serde(flatten)]
        qux: Qux,
        #[serde(skip)]
        ignored: u32,
        #[tag(custom_tag = "TAG_TEST")]
        tag_test: String,
    }

    fn keys(shape: &Shape, tag_name: &str) -> Vec<String> {
        walk(shape, tag_name).iter().map(KeyPath::key).collect()
    }

    fn field(tag: &'static [(&'static str, &'static str)]) -> Field {
        Field::new("Declared", Tags::new(tag), Shape::Leaf(Kind::Scalar(Scalar::Str)))
    }

    #[test]
    fn test_walk_zero_config_under_default_tag() {
        assert_eq!(
            keys(&Config::default().describe(), DEFAULT_TAG_NAME),
            vec![
                "foo",
                "foo_ptr.value",
                "bar.baz",
                "quuux",
                "quuux_ptr.value",
                "tag_test",
            ]
        );
    }

    #[test]
    fn test_walk_includes_current_map_entries() {
        let mut config = Config::default();
        config.qux_map.insert("key1".to_string(), Qux::default());

        let found = keys(&config.describe(), DEFAULT_TAG_NAME);
        assert!(found.contains(&"qux_map.key1.quuux".to_string()));
        assert!(found.contains(&"qux_map.key1.quuux_ptr.value".to_string()));
    }

    #[test]
    fn test_walk_under_custom_tag_ignores_serde_directives() {
        let found = keys(&Config::default().describe(), "custom_tag");
        assert!(found.contains(&"TAG_TEST".to_string()));
        assert!(found.contains(&"bar.baz_value".to_string()));
        assert!(found.contains(&"qux.quuux".to_string()));
        assert!(found.contains(&"ignored".to_string()));
        assert!(!found.contains(&"tag_test".to_string()));
    }

    #[test]
    fn test_leaf_kinds_are_carried() {
        let paths = walk(&Config::default().describe(), DEFAULT_TAG_NAME);
        let baz = paths.iter().find(|p| p.key() == "bar.baz").unwrap();
        assert_eq!(baz.kind(), Kind::Scalar(Scalar::Int));
        assert_eq!(baz.segments(), ["bar".to_string(), "baz".to_string()]);
        let quuux = paths.iter().find(|p| p.key() == "quuux").unwrap();
        assert_eq!(quuux.kind(), Kind::Scalar(Scalar::Bool));
    }

    #[test]
    fn test_resolve_tag_forms() {
        assert_eq!(resolve(&field(&[]), "serde"), Directive::Named("Declared"));
        assert_eq!(resolve(&field(&[("serde", "alt")]), "serde"), Directive::Named("alt"));
        assert_eq!(resolve(&field(&[("serde", ",omitempty")]), "serde"), Directive::Named("Declared"));
        assert_eq!(resolve(&field(&[("serde", ",squash")]), "serde"), Directive::Squash);
        assert_eq!(resolve(&field(&[("serde", "-")]), "serde"), Directive::Skip);
        assert_eq!(resolve(&field(&[("json", "-")]), "serde"), Directive::Named("Declared"));
    }

    #[test]
    fn test_squash_wins_over_explicit_name() {
        assert_eq!(resolve(&field(&[("serde", "named,squash")]), "serde"), Directive::Squash);
    }

    #[test]
    fn test_skip_wins_over_squash() {
        assert_eq!(resolve(&field(&[("serde", "-,squash")]), "serde"), Directive::Skip);
    }

    #[test]
    fn test_non_string_map_keys_are_skipped() {
        let mut ports: HashMap<u16, String> = HashMap::new();
        ports.insert(8080, "http".to_string());
        let shape = Shape::Struct(vec![Field::new("ports", Tags::EMPTY, ports.describe())]);
        assert!(walk(&shape, DEFAULT_TAG_NAME).is_empty());
    }

    #[test]
    fn test_top_level_leaf_yields_empty_key() {
        let paths = walk(&Shape::Leaf(Kind::Scalar(Scalar::Str)), DEFAULT_TAG_NAME);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].key(), "");
    }

    #[test]
    fn test_empty_map_yields_nothing() {
        let shape = Shape::Struct(vec![Field::new(
            "servers",
            Tags::EMPTY,
            Shape::Map(Vec::new()),
        )]);
        assert!(walk(&shape, DEFAULT_TAG_NAME).is_empty());
    }

    /// Implements neither `Describe` nor serde traits.
    struct Opaque;

    #[derive(Describe)]
    struct Tagged<T, U> {
        name: String,
        marker: PhantomData<T>,
        #[serde(skip)]
        hidden: Option<T>,
        extra: Option<U>,
    }

    #[test]
    fn test_generic_params_are_bounded_per_described_field() {
        let shape = Tagged::<Opaque, PtrTest>::describe_zero();
        assert_eq!(keys(&shape, DEFAULT_TAG_NAME), vec!["name", "extra.value"]);

        let tagged = Tagged::<Opaque, PtrTest> {
            name: String::new(),
            marker: PhantomData,
            hidden: Some(Opaque),
            extra: None,
        };
        assert_eq!(tagged.describe(), shape);
    }
}
