//! # Formatters
//!
//! A [`Formatter<T>`] writes `T` into a [`ByteBuffer`] and reads it back from a
//! [`SequenceReader`]. Formatters are built once per type by the
//! [`Resolver`](crate::resolver::Resolver), shared behind `Arc`, and carry no
//! per-call state, so one instance serves any number of threads.
//!
//! ## Contract
//! - `serialize` writes the value; `deserialize` consumes exactly what `serialize`
//!   wrote
//! - `get_length` is exact for fixed-width types and an upper bound otherwise
//! - `default_length` is a size hint for pre-sizing buffers
//! - Nil (`0xC0`) is only ever produced and accepted by `Option` and [`AnyObject`];
//!   every other formatter reports a nil marker as a decode fault
//!
//! ## Modules
//! - [`code`]: type codes and headers
//! - [`primitive`], [`string`], [`wrapper`]: scalars, text, `Option`/`Box`/tuples
//! - [`collection`], [`map`]: sequences, sets, byte arrays and dictionaries
//! - [`object`]: runtime-typed values

use std::any::Any;
use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::Result;
use crate::resolver::Resolver;

pub mod code;
pub mod collection;
pub mod map;
pub mod object;
pub mod primitive;
pub mod string;
pub mod wrapper;

pub use object::AnyObject;

/// Serializer, deserializer and length estimator for one type
pub trait Formatter<T>: Send + Sync {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()>;

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<T>;

    /// Encoded size of `value`: exact for fixed-width types, an upper bound otherwise.
    fn get_length(&self, value: &T) -> u64;

    /// Typical encoded size, used to pre-size output buffers.
    fn default_length(&self) -> u64;
}

/// How a [`Formattable`] type is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatterKind {
    /// Built-in scalar; never overridden by registration
    Primitive,
    /// Shape-driven container (sequence, map, wrapper)
    Container,
    /// Plain object type, usually derived
    Object,
}

/// A type with a compile-time known way to build its formatter.
///
/// Implemented for the built-in scalars and containers, and by
/// `#[derive(Formattable)]` for user types.
pub trait Formattable: Sized + 'static {
    const KIND: FormatterKind;

    /// Whether an encoded value can never start with the nil marker. `Option<Self>`
    /// writes a present marker before values that could.
    const NIL_FREE: bool = true;

    /// Build the formatter, resolving member formatters through `resolver`.
    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>>;
}

/// Reinterpret a formatter for `A` as one for `B` when both are the same type.
pub(crate) fn cast_formatter<A: 'static, B: 'static>(
    formatter: Arc<dyn Formatter<A>>,
) -> Option<Arc<dyn Formatter<B>>> {
    let boxed: Box<dyn Any> = Box::new(formatter);
    boxed
        .downcast::<Arc<dyn Formatter<B>>>()
        .ok()
        .map(|formatter| *formatter)
}
