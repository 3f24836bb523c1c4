//! Parsing for `#[derive(Formattable)]`.
//!
//! Turns the derive input into a [`FormattableDef`]: the struct's members with their
//! `#[wire(...)]` options, or the enum's variants and discriminant type.

use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use syn::{
    parse_quote, Attribute, Data, DataEnum, DeriveInput, Error, Fields, GenericParam, Generics,
    Ident, Index, Member, Result, Type,
};

/// Integer types accepted in `#[repr(...)]`
const REPR_TYPES: &[&str] = &[
    "u8", "u16", "u32", "u64", "usize", "i8", "i16", "i32", "i64", "isize",
];

/// Parsed derive input.
pub struct FormattableDef {
    pub ident: Ident,
    pub generics: Generics,
    pub body: Body,
}

pub enum Body {
    Struct(StructDef),
    Enum(EnumDef),
}

/// Struct layout
pub struct StructDef {
    pub style: StructStyle,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructStyle {
    Named,
    Tuple,
    Unit,
}

pub struct FieldDef {
    /// Field name, or position for tuple structs
    pub member: Member,
    pub ty: Type,
    /// `#[wire(skip)]`: not written, rebuilt with `Default::default()`
    pub skip: bool,
}

/// Fieldless enum
pub struct EnumDef {
    /// Discriminant type from `#[repr(...)]`, `i32` when absent
    pub repr: Type,
    pub variants: Vec<Ident>,
}

impl FormattableDef {
    /// Members that are written, in declaration order.
    pub fn written_fields(&self) -> impl Iterator<Item = &FieldDef> {
        let fields = match &self.body {
            Body::Struct(def) => def.fields.as_slice(),
            Body::Enum(_) => &[],
        };
        fields.iter().filter(|field| !field.skip)
    }

    /// Names of the type parameters.
    pub fn type_params(&self) -> Vec<Ident> {
        self.generics
            .params
            .iter()
            .filter_map(|param| match param {
                GenericParam::Type(param) => Some(param.ident.clone()),
                _ => None,
            })
            .collect()
    }
}

pub fn parse_formattable(input: &DeriveInput) -> Result<FormattableDef> {
    if let Some(lifetime) = input.generics.lifetimes().next() {
        return Err(Error::new_spanned(
            lifetime,
            "Formattable types must be 'static; lifetime parameters are not supported",
        ));
    }

    let body = match &input.data {
        Data::Struct(data) => Body::Struct(parse_struct(&data.fields)?),
        Data::Enum(data) => Body::Enum(parse_enum(data, &input.attrs, &input.ident)?),
        Data::Union(data) => {
            return Err(Error::new_spanned(
                data.union_token,
                "Formattable cannot be derived for unions",
            ))
        }
    };

    Ok(FormattableDef {
        ident: input.ident.clone(),
        generics: input.generics.clone(),
        body,
    })
}

fn parse_struct(fields: &Fields) -> Result<StructDef> {
    let style = match fields {
        Fields::Named(_) => StructStyle::Named,
        Fields::Unnamed(_) => StructStyle::Tuple,
        Fields::Unit => StructStyle::Unit,
    };

    let fields = fields
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let member = match &field.ident {
                Some(ident) => Member::Named(ident.clone()),
                None => Member::Unnamed(Index::from(position)),
            };
            Ok(FieldDef {
                member,
                ty: field.ty.clone(),
                skip: parse_field_options(&field.attrs)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StructDef { style, fields })
}

/// Read `#[wire(...)]` on a field; returns whether it is skipped.
fn parse_field_options(attrs: &[Attribute]) -> Result<bool> {
    let mut skip = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("wire")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported wire option; expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn parse_enum(data: &DataEnum, attrs: &[Attribute], ident: &Ident) -> Result<EnumDef> {
    if data.variants.is_empty() {
        return Err(Error::new_spanned(
            ident,
            "Formattable cannot be derived for an enum without variants",
        ));
    }

    let variants = data
        .variants
        .iter()
        .map(|variant| match variant.fields {
            Fields::Unit => Ok(variant.ident.clone()),
            _ => Err(Error::new_spanned(
                variant,
                "Formattable can only be derived for enums whose variants have no fields",
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EnumDef {
        repr: parse_repr(attrs)?.unwrap_or_else(|| parse_quote!(i32)),
        variants,
    })
}

/// Integer type named in `#[repr(...)]`, ignoring `C` and alignment hints.
fn parse_repr(attrs: &[Attribute]) -> Result<Option<Type>> {
    let mut repr = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("repr")) {
        attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                if REPR_TYPES.iter().any(|name| ident == *name) {
                    repr = Some(Type::Verbatim(ident.to_token_stream()));
                }
            }
            // `align(N)` and `packed(N)` carry arguments.
            if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream>()?;
            }
            Ok(())
        })?;
    }
    Ok(repr)
}

/// Whether `ty` names any of `params` anywhere inside it.
pub fn mentions_any(ty: &Type, params: &[Ident]) -> bool {
    fn walk(tokens: TokenStream, params: &[Ident]) -> bool {
        tokens.into_iter().any(|token| match token {
            TokenTree::Ident(ident) => params.iter().any(|param| *param == ident),
            TokenTree::Group(group) => walk(group.stream(), params),
            _ => false,
        })
    }
    !params.is_empty() && walk(ty.to_token_stream(), params)
}
