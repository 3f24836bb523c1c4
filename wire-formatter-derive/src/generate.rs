//! Code generation for `#[derive(Formattable)]`.
//!
//! Structs get an `AutoFormatter` whose member formatters are resolved once, when
//! the type is first used. Enums get an `EnumFormatter` over their discriminant.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, Generics, Index};

use crate::parse::{mentions_any, Body, EnumDef, FormattableDef, StructDef, StructStyle};

pub fn generate_formattable(def: &FormattableDef) -> TokenStream {
    let ident = &def.ident;
    let generics = bounded_generics(def);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let (nil_free, build) = match &def.body {
        Body::Struct(body) => (struct_nil_free(def), struct_build(def, body)),
        Body::Enum(body) => (quote! { true }, enum_build(body)),
    };

    quote! {
        impl #impl_generics ::wire_formatter::Formattable for #ident #ty_generics #where_clause {
            const KIND: ::wire_formatter::FormatterKind = ::wire_formatter::FormatterKind::Object;
            const NIL_FREE: bool = #nil_free;

            fn build_formatter(
                resolver: &::wire_formatter::Resolver,
            ) -> ::wire_formatter::Result<
                ::std::sync::Arc<dyn ::wire_formatter::Formatter<Self>>,
            > {
                #build
            }
        }
    }
}

/// Type parameters must be `'static`; written field types that use a type
/// parameter must be `Formattable`, skipped ones `Default`.
fn bounded_generics(def: &FormattableDef) -> Generics {
    let mut generics = def.generics.clone();
    let params = def.type_params();
    if params.is_empty() {
        return generics;
    }

    let fields = match &def.body {
        Body::Struct(body) => body.fields.as_slice(),
        Body::Enum(_) => &[],
    };
    let where_clause = generics.make_where_clause();
    for param in &params {
        where_clause.predicates.push(parse_quote!(#param: 'static));
    }
    for field in fields.iter().filter(|field| mentions_any(&field.ty, &params)) {
        let ty = &field.ty;
        if field.skip {
            where_clause
                .predicates
                .push(parse_quote!(#ty: ::core::default::Default));
        } else {
            where_clause
                .predicates
                .push(parse_quote!(#ty: ::wire_formatter::Formattable));
        }
    }
    generics
}

/// A struct can start with nil only through its first written member.
fn struct_nil_free(def: &FormattableDef) -> TokenStream {
    match def.written_fields().next() {
        Some(field) => {
            let ty = &field.ty;
            quote! { <#ty as ::wire_formatter::Formattable>::NIL_FREE }
        }
        // Nothing is written, so `Some(value)` needs the present marker.
        None => quote! { false },
    }
}

fn struct_build(def: &FormattableDef, body: &StructDef) -> TokenStream {
    let written: Vec<_> = def.written_fields().collect();
    let types = written.iter().map(|field| &field.ty);
    let slots: Vec<Index> = (0..written.len()).map(Index::from).collect();
    let members: Vec<_> = written.iter().map(|field| &field.member).collect();

    let serialize = slots.iter().zip(&members).map(|(slot, member)| {
        quote! {
            ::wire_formatter::Formatter::serialize(&*__members.#slot, __buffer, &__value.#member)?;
        }
    });
    let length = slots.iter().zip(&members).map(|(slot, member)| {
        quote! { + ::wire_formatter::Formatter::get_length(&*__members.#slot, &__value.#member) }
    });
    let default_length = slots.iter().map(|slot| {
        quote! { + ::wire_formatter::Formatter::default_length(&*__members.#slot) }
    });

    // Written members are read in declaration order; skipped ones are defaulted.
    let mut slot = 0usize;
    let values: Vec<TokenStream> = body
        .fields
        .iter()
        .map(|field| {
            if field.skip {
                quote! { ::core::default::Default::default() }
            } else {
                let index = Index::from(slot);
                slot += 1;
                quote! { ::wire_formatter::Formatter::deserialize(&*__members.#index, __reader)? }
            }
        })
        .collect();
    let construct = match body.style {
        StructStyle::Named => {
            let names = body.fields.iter().map(|field| &field.member);
            quote! { Self { #(#names: #values),* } }
        }
        StructStyle::Tuple => quote! { Self(#(#values),*) },
        StructStyle::Unit => quote! { Self },
    };

    quote! {
        let __members = ( #(resolver.get_formatter::<#types>()?,)* );
        let __default_length = 0u64 #(#default_length)*;
        ::std::result::Result::Ok(::std::sync::Arc::new(
            ::wire_formatter::resolver::AutoFormatter::<Self, _>::new(
                __members,
                |__members, __buffer: &mut ::wire_formatter::ByteBuffer, __value: &Self| {
                    #(#serialize)*
                    ::std::result::Result::Ok(())
                },
                |__members, __reader: &mut ::wire_formatter::SequenceReader| {
                    ::std::result::Result::Ok(#construct)
                },
                |__members, __value: &Self| 0u64 #(#length)*,
                __default_length,
            ),
        ))
    }
}

fn enum_build(body: &EnumDef) -> TokenStream {
    let repr = &body.repr;
    let variants = &body.variants;

    quote! {
        let __repr = resolver.get_formatter::<#repr>()?;
        ::std::result::Result::Ok(::std::sync::Arc::new(
            ::wire_formatter::resolver::EnumFormatter::<Self, #repr>::new(
                __repr,
                |__value: &Self| match __value {
                    #(Self::#variants => Self::#variants as #repr,)*
                },
                |__discriminant: #repr| {
                    #(
                        if __discriminant == Self::#variants as #repr {
                            return ::std::option::Option::Some(Self::#variants);
                        }
                    )*
                    ::std::option::Option::None
                },
            ),
        ))
    }
}
