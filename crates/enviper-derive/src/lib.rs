//! `#[derive(Describe)]` for enviper.
//!
//! Responsibilities:
//! - Translate a struct's serde attributes into `serde` tags on each field.
//! - Collect `#[tag(name = "value")]` pairs for alternative tag namespaces.
//! - Emit `describe` (live values) and `describe_zero` (type-only) bodies.
//!
//! Does NOT handle:
//! - Interpreting tags; key path derivation lives in `enviper::walk`.
//!
//! Invariants / Assumptions:
//! - Generated code refers to the runtime crate as `::enviper`.
//! - Fields skipped by serde are never described, so their types need no `Describe` impl.
//! - Generic structs bound each described field type, never the bare parameters.
//! - Enums, unit structs and tuple structs other than newtypes are opaque leaves.

mod attrs;
mod case;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, FieldsNamed, Type, parse_macro_input, parse_quote};

use attrs::ContainerAttrs;

#[proc_macro_derive(Describe, attributes(tag, serde))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let container = attrs::container(&input.attrs)?;
    let name = &input.ident;

    let expansion = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) if container.transparent => transparent(fields)?,
            Fields::Named(fields) => named(fields, &container)?,
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let ty = &fields.unnamed[0].ty;
                Expansion {
                    describe: quote!(::enviper::Describe::describe(&self.0)),
                    describe_zero: quote!(<#ty as ::enviper::Describe>::describe_zero()),
                    described: vec![ty.clone()],
                }
            }
            _ => Expansion::opaque(),
        },
        Data::Enum(_) | Data::Union(_) => Expansion::opaque(),
    };
    let Expansion {
        describe,
        describe_zero,
        described,
    } = expansion;

    // Only described field types need `Describe`; parameters used solely in
    // skipped or phantom fields stay unbounded.
    let mut generics = input.generics.clone();
    if generics.type_params().next().is_some() {
        let where_clause = generics.make_where_clause();
        for ty in &described {
            where_clause
                .predicates
                .push(parse_quote!(#ty: ::enviper::Describe));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::enviper::Describe for #name #ty_generics #where_clause {
            fn describe(&self) -> ::enviper::Shape {
                #describe
            }

            fn describe_zero() -> ::enviper::Shape {
                #describe_zero
            }
        }
    })
}

/// Generated method bodies plus the field types they call `Describe` on.
struct Expansion {
    describe: TokenStream2,
    describe_zero: TokenStream2,
    described: Vec<Type>,
}

impl Expansion {
    fn opaque() -> Self {
        Self {
            describe: opaque(),
            describe_zero: opaque(),
            described: Vec::new(),
        }
    }
}

fn opaque() -> TokenStream2 {
    quote!(::enviper::Shape::Leaf(::enviper::Kind::Scalar(::enviper::Scalar::Any)))
}

fn named(fields: &FieldsNamed, container: &ContainerAttrs) -> syn::Result<Expansion> {
    let mut live = Vec::with_capacity(fields.named.len());
    let mut zero = Vec::with_capacity(fields.named.len());
    let mut described = Vec::new();

    for field in &fields.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let ident_name = ident.unraw().to_string();
        let attrs = attrs::field(&field.attrs)?;

        let pairs = attrs
            .tags(&ident_name, container.rename_all)
            .into_iter()
            .map(|(tag, value)| quote!((#tag, #value)));
        let tags = quote!(::enviper::Tags::new(&[#(#pairs),*]));

        let ty = &field.ty;
        let (live_shape, zero_shape) = if attrs.skip {
            (opaque(), opaque())
        } else {
            described.push(ty.clone());
            (
                quote!(::enviper::Describe::describe(&self.#ident)),
                quote!(<#ty as ::enviper::Describe>::describe_zero()),
            )
        };

        live.push(quote!(::enviper::Field::new(#ident_name, #tags, #live_shape)));
        zero.push(quote!(::enviper::Field::new(#ident_name, #tags, #zero_shape)));
    }

    Ok(Expansion {
        describe: quote!(::enviper::Shape::Struct(::std::vec![#(#live),*])),
        describe_zero: quote!(::enviper::Shape::Struct(::std::vec![#(#zero),*])),
        described,
    })
}

/// `#[serde(transparent)]` structs describe as their single non-skipped field.
fn transparent(fields: &FieldsNamed) -> syn::Result<Expansion> {
    for field in &fields.named {
        if attrs::field(&field.attrs)?.skip {
            continue;
        }
        if let Some(ident) = &field.ident {
            let ty = &field.ty;
            return Ok(Expansion {
                describe: quote!(::enviper::Describe::describe(&self.#ident)),
                describe_zero: quote!(<#ty as ::enviper::Describe>::describe_zero()),
                described: vec![ty.clone()],
            });
        }
    }
    Ok(Expansion::opaque())
}
