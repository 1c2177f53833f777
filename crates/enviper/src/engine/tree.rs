//! Helpers over the untyped `serde_json::Value` tree that layers are merged into.

use serde_json::{Map, Value};

use super::env::coerce;
use crate::shape::{Entry, Field, Shape};
use crate::walk::{DEFAULT_TAG_NAME, Directive, resolve};

/// Insert `value` at the dotted `key`, creating intermediate maps as needed.
///
/// Intermediate non-map values are replaced by maps.
pub(crate) fn set_path(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments = key.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_owned(), value);
            return;
        }
        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Look up the dotted `key`.
pub(crate) fn get_path<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Deep-merge `incoming` into `base`. Maps merge key by key; anything else replaces.
pub(crate) fn merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => merge_maps(base, incoming),
        (base, incoming) => *base = incoming,
    }
}

pub(crate) fn merge_maps(base: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Rename keys written under `tag_name` to the names serde decodes.
///
/// Fields squashed under serde have their children lifted into the parent map.
pub(crate) fn rekey(map: &mut Map<String, Value>, shape: &Shape, tag_name: &str) {
    match shape {
        Shape::Struct(fields) => {
            for field in fields {
                let source = match resolve(field, tag_name) {
                    Directive::Skip => continue,
                    Directive::Squash => {
                        rekey(map, &field.shape, tag_name);
                        continue;
                    }
                    Directive::Named(name) => name,
                };
                match resolve(field, DEFAULT_TAG_NAME) {
                    Directive::Skip => {}
                    Directive::Squash => {
                        if let Some(Value::Object(mut child)) = map.remove(source) {
                            rekey(&mut child, &field.shape, tag_name);
                            merge_maps(map, child);
                        }
                    }
                    Directive::Named(target) => {
                        if source != target
                            && let Some(value) = map.remove(source)
                        {
                            map.insert(target.to_owned(), value);
                        }
                        if let Some(Value::Object(child)) = map.get_mut(target) {
                            rekey(child, &field.shape, tag_name);
                        }
                    }
                }
            }
        }
        Shape::Map(entries) => {
            for entry in entries {
                if let Some(key) = &entry.key
                    && let Some(Value::Object(child)) = map.get_mut(key)
                {
                    rekey(child, &entry.shape, tag_name);
                }
            }
        }
        Shape::Leaf(_) => {}
    }
}

/// Shape to use for the map entry stored under `key`.
///
/// Keys the target does not hold yet borrow the shape of its first entry.
fn entry_shape<'a>(entries: &'a [Entry], key: &str) -> Option<&'a Shape> {
    entries
        .iter()
        .find(|entry| entry.key.as_deref() == Some(key))
        .or_else(|| entries.first())
        .map(|entry| &entry.shape)
}

/// Names a struct's fields occupy in one map under `tag_name`, squashed children included.
fn field_names<'a>(fields: &'a [Field], tag_name: &str, out: &mut Vec<&'a str>) {
    for field in fields {
        match resolve(field, tag_name) {
            Directive::Skip => {}
            Directive::Squash => {
                if let Shape::Struct(inner) = &field.shape {
                    field_names(inner, tag_name, out);
                }
            }
            Directive::Named(name) => out.push(name),
        }
    }
}

/// Rename keys that spell a field name of `shape` in a different ASCII case.
///
/// Case variants are merged in key order and the exact spelling is merged last.
/// Keys that exactly name another field are left alone. Map keys are never renamed.
pub(crate) fn fold_case(map: &mut Map<String, Value>, shape: &Shape, tag_name: &str) {
    match shape {
        Shape::Struct(fields) => {
            let mut names = Vec::new();
            field_names(fields, tag_name, &mut names);
            fold_fields(map, fields, tag_name, &names);
        }
        Shape::Map(entries) => {
            for (key, child) in map.iter_mut() {
                if let (Some(shape), Value::Object(child)) = (entry_shape(entries, key), child) {
                    fold_case(child, shape, tag_name);
                }
            }
        }
        Shape::Leaf(_) => {}
    }
}

fn fold_fields(map: &mut Map<String, Value>, fields: &[Field], tag_name: &str, names: &[&str]) {
    for field in fields {
        let name = match resolve(field, tag_name) {
            Directive::Skip => continue,
            Directive::Squash => {
                if let Shape::Struct(inner) = &field.shape {
                    fold_fields(map, inner, tag_name, names);
                }
                continue;
            }
            Directive::Named(name) => name,
        };

        let mut keys: Vec<String> = map
            .keys()
            .filter(|key| key.eq_ignore_ascii_case(name) && !names.contains(&key.as_str()))
            .cloned()
            .collect();
        if !keys.is_empty() {
            keys.push(name.to_owned());
            let mut folded: Option<Value> = None;
            for key in &keys {
                let Some(value) = map.remove(key) else {
                    continue;
                };
                match folded.as_mut() {
                    Some(existing) => merge(existing, value),
                    None => folded = Some(value),
                }
            }
            if let Some(value) = folded {
                map.insert(name.to_owned(), value);
            }
        }

        if let Some(Value::Object(child)) = map.get_mut(name) {
            fold_case(child, &field.shape, tag_name);
        }
    }
}

/// Coerce string values sitting on typed leaves of `shape`, as for environment values.
///
/// Used for formats that only carry strings, such as dotenv files.
pub(crate) fn coerce_strings(map: &mut Map<String, Value>, shape: &Shape, tag_name: &str) {
    match shape {
        Shape::Struct(fields) => {
            for field in fields {
                match resolve(field, tag_name) {
                    Directive::Skip => {}
                    Directive::Squash => coerce_strings(map, &field.shape, tag_name),
                    Directive::Named(name) => {
                        if let Some(child) = map.get_mut(name) {
                            coerce_value(child, &field.shape, tag_name);
                        }
                    }
                }
            }
        }
        Shape::Map(entries) => {
            for (key, child) in map.iter_mut() {
                if let Some(shape) = entry_shape(entries, key) {
                    coerce_value(child, shape, tag_name);
                }
            }
        }
        Shape::Leaf(_) => {}
    }
}

fn coerce_value(value: &mut Value, shape: &Shape, tag_name: &str) {
    match shape {
        Shape::Leaf(kind) => {
            if let Value::String(raw) = value {
                let coerced = coerce(raw, *kind);
                *value = coerced;
            }
        }
        Shape::Struct(_) | Shape::Map(_) => {
            if let Value::Object(map) = value {
                coerce_strings(map, shape, tag_name);
            }
        }
    }
}
