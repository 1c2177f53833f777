//! Parsing of `#[serde(...)]` and `#[tag(...)]` attributes into structural tags.

use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr, Token};

use crate::case::RenameRule;

#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub(crate) rename_all: Option<RenameRule>,
    pub(crate) transparent: bool,
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    rename: Option<String>,
    flatten: bool,
    pub(crate) skip: bool,
    tags: Vec<(String, String)>,
}

impl FieldAttrs {
    /// Value of the `serde` tag implied by serde's own attributes.
    fn serde_tag(&self, ident: &str, rename_all: Option<RenameRule>) -> Option<String> {
        if self.skip {
            return Some("-".to_string());
        }
        if self.flatten {
            return Some(",squash".to_string());
        }
        match (&self.rename, rename_all) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(rule)) => Some(rule.apply_to_field(ident)),
            (None, None) => None,
        }
    }

    /// All tags of the field; an explicit `#[tag(serde = "..")]` wins over the derived one.
    pub(crate) fn tags(&self, ident: &str, rename_all: Option<RenameRule>) -> Vec<(String, String)> {
        let mut tags = self.tags.clone();
        if !tags.iter().any(|(name, _)| name == "serde")
            && let Some(value) = self.serde_tag(ident, rename_all)
        {
            tags.insert(0, ("serde".to_string(), value));
        }
        tags
    }
}

pub(crate) fn container(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if let Some(rule) = rename_value(&meta)? {
                    let parsed = RenameRule::parse(&rule.value()).ok_or_else(|| {
                        syn::Error::new(rule.span(), "unknown rename_all rule")
                    })?;
                    out.rename_all = Some(parsed);
                }
            } else if meta.path.is_ident("transparent") {
                out.transparent = true;
            } else {
                ignore(&meta)?;
            }
            Ok(())
        })?;
    }
    Ok(out)
}

pub(crate) fn field(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if let Some(name) = rename_value(&meta)? {
                        out.rename = Some(name.value());
                    }
                } else if meta.path.is_ident("flatten") {
                    out.flatten = true;
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    out.skip = true;
                } else {
                    ignore(&meta)?;
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("tag") {
            attr.parse_nested_meta(|meta| {
                let name = meta
                    .path
                    .get_ident()
                    .ok_or_else(|| meta.error("expected a tag name"))?
                    .to_string();
                let value: LitStr = meta.value()?.parse()?;
                out.tags.push((name, value.value()));
                Ok(())
            })?;
        }
    }
    Ok(out)
}

/// `rename = ".."` or the `deserialize` half of `rename(serialize = "..", deserialize = "..")`.
fn rename_value(meta: &ParseNestedMeta<'_>) -> syn::Result<Option<LitStr>> {
    if meta.input.peek(Token![=]) {
        return Ok(Some(meta.value()?.parse()?));
    }
    let mut deserialize = None;
    meta.parse_nested_meta(|inner| {
        let value: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("deserialize") {
            deserialize = Some(value);
        }
        Ok(())
    })?;
    Ok(deserialize)
}

/// Consume a serde option this crate does not care about.
fn ignore(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| ignore(&nested))?;
    }
    Ok(())
}
