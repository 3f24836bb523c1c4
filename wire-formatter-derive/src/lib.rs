//! Derive macro for the `wire-formatter` crate.
//!
//! `#[derive(Formattable)]` implements `wire_formatter::Formattable` for:
//!
//! - structs with named fields, tuple structs and unit structs: members are written
//!   back to back in declaration order
//! - enums whose variants carry no fields: the discriminant is written through the
//!   `#[repr]` integer type, `i32` when there is none
//!
//! # Example
//!
//! ```ignore
//! use wire_formatter::Formattable;
//!
//! #[derive(Formattable)]
//! struct Order {
//!     id: u64,
//!     lines: Vec<Line>,
//!     #[wire(skip)]
//!     cached_total: Option<u64>,
//! }
//!
//! #[derive(Clone, Copy, Formattable)]
//! #[repr(u8)]
//! enum Status {
//!     Open = 1,
//!     Closed = 2,
//! }
//! ```
//!
//! Skipped fields must implement `Default`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod generate;
mod parse;

/// Derive `wire_formatter::Formattable`.
///
/// # Attributes
///
/// - `#[wire(skip)]` on a field: the field is neither written nor read; decoding
///   fills it with `Default::default()`
/// - `#[repr(u8 | u16 | ... | i64)]` on an enum: the discriminant type on the wire
#[proc_macro_derive(Formattable, attributes(wire))]
pub fn derive_formattable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let def = match parse::parse_formattable(&input) {
        Ok(def) => def,
        Err(err) => return err.to_compile_error().into(),
    };

    TokenStream::from(generate::generate_formattable(&def))
}
