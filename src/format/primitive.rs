//! # Primitive Formatters
//!
//! Tag + payload codecs for the scalar types. `u8` and `i8` have a one-byte fast
//! path; every other scalar has a single fixed width.
//!
//! | Type              | Bytes            |
//! |-------------------|------------------|
//! | `bool`            | 1                |
//! | `u8`              | 1 below `0x80`, else 2 |
//! | `i8`              | 1 in `-32..=127`, else 2 |
//! | `u16` / `i16`     | 3                |
//! | `u32` / `i32` / `f32` / `char` | 5   |
//! | `u64` / `i64` / `f64` / `usize` / `isize` | 9 |

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, FormatterError, Result};
use crate::format::code::{self, *};
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::resolver::Resolver;

/// Stateless formatter for a scalar type
pub struct PrimitiveFormatter<T>(PhantomData<fn() -> T>);

impl<T> PrimitiveFormatter<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for PrimitiveFormatter<T> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! primitive_formattable {
    ($($ty:ty),* $(,)?) => {$(
        impl Formattable for $ty {
            const KIND: FormatterKind = FormatterKind::Primitive;

            fn build_formatter(_resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
                Ok(Arc::new(PrimitiveFormatter::<$ty>::new()))
            }
        }
    )*};
}

macro_rules! fixed_width {
    ($($ty:ty => $code:expr),* $(,)?) => {$(
        impl Formatter<$ty> for PrimitiveFormatter<$ty> {
            fn serialize(&self, buffer: &mut ByteBuffer, value: &$ty) -> Result<()> {
                buffer.write_tagged($code, &value.to_be_bytes())
            }

            fn deserialize(&self, reader: &mut SequenceReader) -> Result<$ty> {
                code::expect_code(reader, $code)?;
                Ok(<$ty>::from_be_bytes(reader.read_array()?))
            }

            fn get_length(&self, _value: &$ty) -> u64 {
                1 + std::mem::size_of::<$ty>() as u64
            }

            fn default_length(&self) -> u64 {
                1 + std::mem::size_of::<$ty>() as u64
            }
        }
    )*};
}

fixed_width! {
    u16 => UINT16,
    u32 => UINT32,
    u64 => UINT64,
    i16 => INT16,
    i32 => INT32,
    i64 => INT64,
    f32 => FLOAT32,
    f64 => FLOAT64,
}

primitive_formattable!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, char);

impl Formatter<bool> for PrimitiveFormatter<bool> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &bool) -> Result<()> {
        buffer.write_byte(if *value { TRUE } else { FALSE })
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<bool> {
        match reader.peek_u8()? {
            TRUE => reader.advance(1).map(|_| true),
            FALSE => reader.advance(1).map(|_| false),
            NIL => Err(reader.fault(ERR_UNEXPECTED_NIL)),
            _ => Err(reader.fault(ERR_INVALID_BOOL)),
        }
    }

    fn get_length(&self, _value: &bool) -> u64 {
        1
    }

    fn default_length(&self) -> u64 {
        1
    }
}

impl Formatter<u8> for PrimitiveFormatter<u8> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &u8) -> Result<()> {
        if *value <= POSITIVE_FIXINT_MAX {
            buffer.write_byte(*value)
        } else {
            buffer.write_tagged(UINT8, &[*value])
        }
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<u8> {
        let code = reader.peek_u8()?;
        if code <= POSITIVE_FIXINT_MAX {
            reader.advance(1)?;
            return Ok(code);
        }
        code::expect_code(reader, UINT8)?;
        reader.read_u8()
    }

    fn get_length(&self, value: &u8) -> u64 {
        if *value <= POSITIVE_FIXINT_MAX {
            1
        } else {
            2
        }
    }

    fn default_length(&self) -> u64 {
        2
    }
}

impl Formatter<i8> for PrimitiveFormatter<i8> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &i8) -> Result<()> {
        if *value >= -32 {
            buffer.write_byte(*value as u8)
        } else {
            buffer.write_tagged(INT8, &[*value as u8])
        }
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<i8> {
        let code = reader.peek_u8()?;
        if code <= POSITIVE_FIXINT_MAX || code >= NEGATIVE_FIXINT_MIN {
            reader.advance(1)?;
            return Ok(code as i8);
        }
        code::expect_code(reader, INT8)?;
        Ok(reader.read_u8()? as i8)
    }

    fn get_length(&self, value: &i8) -> u64 {
        if *value >= -32 {
            1
        } else {
            2
        }
    }

    fn default_length(&self) -> u64 {
        2
    }
}

impl Formatter<char> for PrimitiveFormatter<char> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &char) -> Result<()> {
        buffer.write_tagged(UINT32, &u32::from(*value).to_be_bytes())
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<char> {
        let start = reader.consumed();
        code::expect_code(reader, UINT32)?;
        let scalar = u32::from_be_bytes(reader.read_array()?);
        char::from_u32(scalar).ok_or_else(|| {
            FormatterError::decode(start as u64, ERR_INVALID_CHAR)
        })
    }

    fn get_length(&self, _value: &char) -> u64 {
        5
    }

    fn default_length(&self) -> u64 {
        5
    }
}

impl Formatter<usize> for PrimitiveFormatter<usize> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &usize) -> Result<()> {
        buffer.write_tagged(UINT64, &(*value as u64).to_be_bytes())
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<usize> {
        let start = reader.consumed();
        code::expect_code(reader, UINT64)?;
        let wide = u64::from_be_bytes(reader.read_array()?);
        usize::try_from(wide).map_err(|_| {
            FormatterError::decode(start as u64, ERR_INTEGER_OVERFLOW)
        })
    }

    fn get_length(&self, _value: &usize) -> u64 {
        9
    }

    fn default_length(&self) -> u64 {
        9
    }
}

impl Formatter<isize> for PrimitiveFormatter<isize> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &isize) -> Result<()> {
        buffer.write_tagged(INT64, &(*value as i64).to_be_bytes())
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<isize> {
        let start = reader.consumed();
        code::expect_code(reader, INT64)?;
        let wide = i64::from_be_bytes(reader.read_array()?);
        isize::try_from(wide).map_err(|_| {
            FormatterError::decode(start as u64, ERR_INTEGER_OVERFLOW)
        })
    }

    fn get_length(&self, _value: &isize) -> u64 {
        9
    }

    fn default_length(&self) -> u64 {
        9
    }
}
