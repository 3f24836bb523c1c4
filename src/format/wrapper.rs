//! # Wrapper Formatters
//!
//! `Option<T>` is where nil lives: `None` is the nil marker and nothing else.
//! `Some(v)` is written as `v` directly when `T`'s encoding can never start with nil,
//! otherwise it is prefixed with the present marker (`0xC1`) so `Some(None)` and
//! `None` stay distinct.
//!
//! `Box<T>` and `Arc<T>` are transparent. Tuples are fixed-arity arrays.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, Result};
use crate::format::code::{self, NIL, PRESENT};
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::resolver::Resolver;

pub struct OptionFormatter<T> {
    inner: Arc<dyn Formatter<T>>,
    present_marker: bool,
}

impl<T> OptionFormatter<T> {
    /// `present_marker` must be set when `inner` can write a leading nil.
    pub fn new(inner: Arc<dyn Formatter<T>>, present_marker: bool) -> Self {
        Self {
            inner,
            present_marker,
        }
    }
}

impl<T> Formatter<Option<T>> for OptionFormatter<T> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &Option<T>) -> Result<()> {
        match value {
            None => code::write_nil(buffer),
            Some(inner) => {
                if self.present_marker {
                    buffer.write_byte(PRESENT)?;
                }
                self.inner.serialize(buffer, inner)
            }
        }
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<Option<T>> {
        match reader.peek_u8()? {
            NIL => {
                reader.advance(1)?;
                Ok(None)
            }
            PRESENT if self.present_marker => {
                reader.advance(1)?;
                self.inner.deserialize(reader).map(Some)
            }
            other if self.present_marker => Err(code::unexpected_code(reader, other)),
            _ => self.inner.deserialize(reader).map(Some),
        }
    }

    fn get_length(&self, value: &Option<T>) -> u64 {
        match value {
            None => 1,
            Some(inner) => u64::from(self.present_marker) + self.inner.get_length(inner),
        }
    }

    fn default_length(&self) -> u64 {
        1 + self.inner.default_length()
    }
}

impl<T: Formattable> Formattable for Option<T> {
    const KIND: FormatterKind = FormatterKind::Container;
    const NIL_FREE: bool = false;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        let inner = resolver.get_formatter::<T>()?;
        Ok(Arc::new(OptionFormatter::new(inner, !T::NIL_FREE)))
    }
}

/// Transparent formatter for smart pointers
pub struct PointerFormatter<P, T> {
    inner: Arc<dyn Formatter<T>>,
    _pointer: PhantomData<fn() -> P>,
}

impl<P, T> PointerFormatter<P, T> {
    pub fn new(inner: Arc<dyn Formatter<T>>) -> Self {
        Self {
            inner,
            _pointer: PhantomData,
        }
    }
}

macro_rules! pointer_formatter {
    ($($pointer:ident),* $(,)?) => {$(
        impl<T> Formatter<$pointer<T>> for PointerFormatter<$pointer<T>, T> {
            fn serialize(&self, buffer: &mut ByteBuffer, value: &$pointer<T>) -> Result<()> {
                self.inner.serialize(buffer, value)
            }

            fn deserialize(&self, reader: &mut SequenceReader) -> Result<$pointer<T>> {
                self.inner.deserialize(reader).map($pointer::new)
            }

            fn get_length(&self, value: &$pointer<T>) -> u64 {
                self.inner.get_length(value)
            }

            fn default_length(&self) -> u64 {
                self.inner.default_length()
            }
        }

        impl<T: Formattable> Formattable for $pointer<T> {
            const KIND: FormatterKind = FormatterKind::Container;
            const NIL_FREE: bool = T::NIL_FREE;

            fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
                let inner = resolver.get_formatter::<T>()?;
                Ok(Arc::new(PointerFormatter::<$pointer<T>, T>::new(inner)))
            }
        }
    )*};
}

pointer_formatter!(Box, Arc);

/// Fixed-arity array of heterogeneous members
pub struct TupleFormatter<M> {
    members: M,
}

macro_rules! tuple_formatter {
    ($arity:expr; $($name:ident : $index:tt),+) => {
        impl<$($name),+> Formatter<($($name,)+)>
            for TupleFormatter<($(Arc<dyn Formatter<$name>>,)+)>
        {
            fn serialize(&self, buffer: &mut ByteBuffer, value: &($($name,)+)) -> Result<()> {
                buffer.nested(|buffer| {
                    code::write_array_header(buffer, $arity)?;
                    $(self.members.$index.serialize(buffer, &value.$index)?;)+
                    Ok(())
                })
            }

            fn deserialize(&self, reader: &mut SequenceReader) -> Result<($($name,)+)> {
                reader.nested(|reader| {
                    let count = code::read_array_header(reader)?;
                    if count != $arity {
                        return Err(reader.fault(ERR_LENGTH_MISMATCH));
                    }
                    Ok(($(self.members.$index.deserialize(reader)?,)+))
                })
            }

            fn get_length(&self, value: &($($name,)+)) -> u64 {
                code::array_header_len($arity) $(+ self.members.$index.get_length(&value.$index))+
            }

            fn default_length(&self) -> u64 {
                code::array_header_len($arity) $(+ self.members.$index.default_length())+
            }
        }

        impl<$($name: Formattable),+> Formattable for ($($name,)+) {
            const KIND: FormatterKind = FormatterKind::Container;

            fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
                let members = ($(resolver.get_formatter::<$name>()?,)+);
                Ok(Arc::new(TupleFormatter { members }))
            }
        }
    };
}

tuple_formatter!(1; A: 0);
tuple_formatter!(2; A: 0, B: 1);
tuple_formatter!(3; A: 0, B: 1, C: 2);
tuple_formatter!(4; A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Formattable>(value: &T) -> Vec<u8> {
        let formatter = Resolver::new().get_formatter::<T>().unwrap();
        let mut buffer = ByteBuffer::from_slice(&[]);
        formatter.serialize(&mut buffer, value).unwrap();
        assert!(formatter.get_length(value) >= buffer.len() as u64);
        buffer.to_vec().unwrap()
    }

    fn decode<T: Formattable>(bytes: &[u8]) -> Result<T> {
        let formatter = Resolver::new().get_formatter::<T>().unwrap();
        let mut buffer = ByteBuffer::from_slice(bytes);
        let mut reader = buffer.reader().unwrap();
        formatter.deserialize(&mut reader)
    }

    #[test]
    fn test_none_is_exactly_nil() {
        assert_eq!(encode::<Option<i32>>(&None), vec![NIL]);
        assert_eq!(decode::<Option<i32>>(&[NIL]).unwrap(), None);
    }

    #[test]
    fn test_some_without_marker() {
        assert_eq!(encode(&Some(5u8)), vec![5]);
        assert_eq!(decode::<Option<u8>>(&[5]).unwrap(), Some(5));
    }

    #[test]
    fn test_nested_option_uses_present_marker() {
        let some_none: Option<Option<u8>> = Some(None);
        assert_eq!(encode(&some_none), vec![PRESENT, NIL]);
        assert_eq!(encode::<Option<Option<u8>>>(&None), vec![NIL]);
        assert_eq!(decode::<Option<Option<u8>>>(&[PRESENT, NIL]).unwrap(), Some(None));
        assert_eq!(decode::<Option<Option<u8>>>(&[PRESENT, 3]).unwrap(), Some(Some(3)));
    }

    #[test]
    fn test_tuple_arity_checked() {
        let bytes = encode(&(1u8, String::from("a")));
        assert_eq!(bytes, vec![0x92, 1, 0xA1, b'a']);
        assert!(decode::<(u8, String, u8)>(&bytes).unwrap_err().is_decode_fault());
        assert_eq!(
            decode::<(u8, String)>(&bytes).unwrap(),
            (1, String::from("a"))
        );
    }

    #[test]
    fn test_box_is_transparent() {
        assert_eq!(encode(&Box::new(7u8)), vec![7]);
        assert_eq!(*decode::<Arc<u8>>(&[7]).unwrap(), 7);
    }
}
