//! Formatters behind `#[derive(Formattable)]`.
//!
//! The derive resolves one formatter per member when the type is first used and
//! stores them in a tuple. The three generated functions index that tuple
//! directly, so a call does no lookups of its own.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::ERR_INVALID_DISCRIMINANT, FormatterError, Result};
use crate::format::Formatter;

pub type SerializeFn<T, M> = fn(&M, &mut ByteBuffer, &T) -> Result<()>;
pub type DeserializeFn<T, M> = fn(&M, &mut SequenceReader) -> Result<T>;
pub type LengthFn<T, M> = fn(&M, &T) -> u64;

/// Member-wise formatter for a plain struct
///
/// Members are written back to back in declaration order with no framing; the
/// struct's own entry counts as one level of nesting.
pub struct AutoFormatter<T, M> {
    members: M,
    serialize: SerializeFn<T, M>,
    deserialize: DeserializeFn<T, M>,
    length: LengthFn<T, M>,
    default_length: u64,
    _type: PhantomData<fn() -> T>,
}

impl<T, M> AutoFormatter<T, M> {
    /// `default_length` is the sum of the members' default lengths.
    pub fn new(
        members: M,
        serialize: SerializeFn<T, M>,
        deserialize: DeserializeFn<T, M>,
        length: LengthFn<T, M>,
        default_length: u64,
    ) -> Self {
        Self {
            members,
            serialize,
            deserialize,
            length,
            default_length,
            _type: PhantomData,
        }
    }

    pub fn members(&self) -> &M {
        &self.members
    }
}

impl<T, M: Send + Sync> Formatter<T> for AutoFormatter<T, M> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        buffer.nested(|buffer| (self.serialize)(&self.members, buffer, value))
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<T> {
        reader.nested(|reader| (self.deserialize)(&self.members, reader))
    }

    fn get_length(&self, value: &T) -> u64 {
        (self.length)(&self.members, value)
    }

    fn default_length(&self) -> u64 {
        self.default_length
    }
}

/// Fieldless enum written as its integer discriminant
pub struct EnumFormatter<T, R> {
    repr: Arc<dyn Formatter<R>>,
    to_repr: fn(&T) -> R,
    from_repr: fn(R) -> Option<T>,
}

impl<T, R> EnumFormatter<T, R> {
    pub fn new(
        repr: Arc<dyn Formatter<R>>,
        to_repr: fn(&T) -> R,
        from_repr: fn(R) -> Option<T>,
    ) -> Self {
        Self {
            repr,
            to_repr,
            from_repr,
        }
    }
}

impl<T, R> Formatter<T> for EnumFormatter<T, R> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        self.repr.serialize(buffer, &(self.to_repr)(value))
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<T> {
        let offset = reader.consumed() as u64;
        let repr = self.repr.deserialize(reader)?;
        (self.from_repr)(repr)
            .ok_or_else(|| FormatterError::decode(offset, ERR_INVALID_DISCRIMINANT))
    }

    fn get_length(&self, value: &T) -> u64 {
        self.repr.get_length(&(self.to_repr)(value))
    }

    fn default_length(&self) -> u64 {
        self.repr.default_length()
    }
}
