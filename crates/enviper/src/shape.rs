//! Self-describing configuration shapes.
//!
//! Responsibilities:
//! - Define the closed set of shape categories the walker dispatches on.
//! - Provide `Describe` implementations for std scalars, optionals, lists and maps.
//!
//! Does NOT handle:
//! - Resolving tags into key segments (see `walk.rs`).
//! - Deriving `Describe` for user structs (see the `enviper-derive` crate).
//!
//! Invariants:
//! - `describe` never mutates the value; an absent `Option` is described through
//!   `describe_zero` of its inner type instead of being filled in.
//! - A map entry whose key cannot form a path segment keeps `key: None`.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

/// Scalar category of a leaf, used to coerce raw environment strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    /// Unknown scalar type; the value is inferred from its text.
    Any,
}

/// Leaf category: a single scalar or a comma separated list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Scalar(Scalar),
    List(Scalar),
}

/// Structural tags attached to a field, as `(tag name, tag value)` pairs.
///
/// A tag value has the form `name[,directive...]`, e.g. `"baz"`, `",squash"` or `"-"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tags(&'static [(&'static str, &'static str)]);

impl Tags {
    pub const EMPTY: Tags = Tags(&[]);

    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self(pairs)
    }

    /// Look up the value of the tag named `name`.
    pub fn lookup(&self, name: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(tag, _)| *tag == name)
            .map(|(_, value)| *value)
    }
}

/// A named struct field together with its tags and the shape of its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ident: &'static str,
    pub tags: Tags,
    pub shape: Shape,
}

impl Field {
    pub fn new(ident: &'static str, tags: Tags, shape: Shape) -> Self {
        Self { ident, tags, shape }
    }
}

/// A map entry. `key` is `None` when the key type cannot be a path segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Option<String>,
    pub shape: Shape,
}

/// Shape of a configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Record with named fields in declaration order.
    Struct(Vec<Field>),
    /// Keyed mapping with its current entries.
    Map(Vec<Entry>),
    /// Anything that is neither a struct nor a map.
    Leaf(Kind),
}

/// Capability of a configuration type to describe its own shape.
///
/// Usually derived with `#[derive(enviper::Describe)]`.
pub trait Describe {
    /// Shape of this value, including current map entries.
    fn describe(&self) -> Shape;

    /// Shape of a zero-valued instance of this type.
    fn describe_zero() -> Shape
    where
        Self: Sized;
}

/// Map key types that may or may not produce a path segment.
pub trait MapKey {
    fn segment(&self) -> Option<String>;
}

impl MapKey for String {
    fn segment(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl MapKey for &str {
    fn segment(&self) -> Option<String> {
        Some((*self).to_owned())
    }
}

impl MapKey for Box<str> {
    fn segment(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl MapKey for Cow<'_, str> {
    fn segment(&self) -> Option<String> {
        Some(self.to_string())
    }
}

macro_rules! unsegmented_keys {
    ($($ty:ty),+ $(,)?) => {$(
        impl MapKey for $ty {
            fn segment(&self) -> Option<String> {
                None
            }
        }
    )+};
}

unsegmented_keys!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize
);

macro_rules! leaf {
    ($kind:expr => $($ty:ty),+ $(,)?) => {$(
        impl Describe for $ty {
            fn describe(&self) -> Shape {
                Shape::Leaf($kind)
            }

            fn describe_zero() -> Shape {
                Shape::Leaf($kind)
            }
        }
    )+};
}

leaf!(Kind::Scalar(Scalar::Bool) => bool);
leaf!(Kind::Scalar(Scalar::Int) => i8, i16, i32, i64, i128, isize);
leaf!(Kind::Scalar(Scalar::Uint) => u8, u16, u32, u64, u128, usize);
leaf!(Kind::Scalar(Scalar::Float) => f32, f64);
leaf!(Kind::Scalar(Scalar::Str) =>
    String, char, PathBuf, IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr
);
leaf!(Kind::Scalar(Scalar::Any) => serde_json::Value);

impl<T: Describe> Describe for Option<T> {
    fn describe(&self) -> Shape {
        match self {
            Some(value) => value.describe(),
            None => T::describe_zero(),
        }
    }

    fn describe_zero() -> Shape {
        T::describe_zero()
    }
}

/// Markers carry no configuration; they describe as a struct without fields.
impl<T: ?Sized> Describe for PhantomData<T> {
    fn describe(&self) -> Shape {
        Shape::Struct(Vec::new())
    }

    fn describe_zero() -> Shape {
        Shape::Struct(Vec::new())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe(&self) -> Shape {
        (**self).describe()
    }

    fn describe_zero() -> Shape {
        T::describe_zero()
    }
}

/// Lists are leaves; the element scalar is kept for coercion.
fn list_of<T: Describe>() -> Shape {
    match T::describe_zero() {
        Shape::Leaf(Kind::Scalar(scalar)) => Shape::Leaf(Kind::List(scalar)),
        _ => Shape::Leaf(Kind::List(Scalar::Any)),
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe(&self) -> Shape {
        list_of::<T>()
    }

    fn describe_zero() -> Shape {
        list_of::<T>()
    }
}

impl<T: Describe> Describe for VecDeque<T> {
    fn describe(&self) -> Shape {
        list_of::<T>()
    }

    fn describe_zero() -> Shape {
        list_of::<T>()
    }
}

impl<T: Describe, S> Describe for HashSet<T, S> {
    fn describe(&self) -> Shape {
        list_of::<T>()
    }

    fn describe_zero() -> Shape {
        list_of::<T>()
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn describe(&self) -> Shape {
        list_of::<T>()
    }

    fn describe_zero() -> Shape {
        list_of::<T>()
    }
}

fn entries<'a, K, V>(iter: impl Iterator<Item = (&'a K, &'a V)>) -> Shape
where
    K: MapKey + 'a,
    V: Describe + 'a,
{
    Shape::Map(
        iter.map(|(key, value)| Entry {
            key: key.segment(),
            shape: value.describe(),
        })
        .collect(),
    )
}

impl<K: MapKey, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe(&self) -> Shape {
        entries(self.iter())
    }

    fn describe_zero() -> Shape {
        Shape::Map(Vec::new())
    }
}

impl<K: MapKey, V: Describe> Describe for BTreeMap<K, V> {
    fn describe(&self) -> Shape {
        entries(self.iter())
    }

    fn describe_zero() -> Shape {
        Shape::Map(Vec::new())
    }
}
