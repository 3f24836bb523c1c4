//! String formatters: a length header (`0xA0 | len` below 32 bytes, else `0xDB` +
//! u32) followed by the UTF-8 bytes.

use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::Result;
use crate::format::code;
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::resolver::Resolver;

/// Size hint for a typical string value
pub const DEFAULT_STRING_LENGTH: u64 = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct StringFormatter;

impl Formatter<String> for StringFormatter {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &String) -> Result<()> {
        code::write_str(buffer, value)
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<String> {
        code::read_str(reader)
    }

    fn get_length(&self, value: &String) -> u64 {
        code::str_header_len(value.len()) + value.len() as u64
    }

    fn default_length(&self) -> u64 {
        DEFAULT_STRING_LENGTH
    }
}

impl Formatter<Box<str>> for StringFormatter {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &Box<str>) -> Result<()> {
        code::write_str(buffer, value)
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<Box<str>> {
        code::read_str(reader).map(String::into_boxed_str)
    }

    fn get_length(&self, value: &Box<str>) -> u64 {
        code::str_header_len(value.len()) + value.len() as u64
    }

    fn default_length(&self) -> u64 {
        DEFAULT_STRING_LENGTH
    }
}

impl Formattable for String {
    const KIND: FormatterKind = FormatterKind::Primitive;

    fn build_formatter(_resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        Ok(Arc::new(StringFormatter))
    }
}

impl Formattable for Box<str> {
    const KIND: FormatterKind = FormatterKind::Primitive;

    fn build_formatter(_resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        Ok(Arc::new(StringFormatter))
    }
}
