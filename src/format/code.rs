//! # Wire Codes
//!
//! Type codes and header helpers for the binary layout. All multi-byte payloads are
//! big-endian.
//!
//! | Code          | Meaning                          | Bytes            |
//! |---------------|----------------------------------|------------------|
//! | `0x00..=0x7F` | positive fixint                  | 1                |
//! | `0x80..=0x8F` | map header, `n < 16`             | 1                |
//! | `0x90..=0x9F` | array header, `n < 16`           | 1                |
//! | `0xA0..=0xBF` | string header, `len < 32`        | 1                |
//! | `0xC0`        | nil                              | 1                |
//! | `0xC1`        | present marker                   | 1                |
//! | `0xC2`/`0xC3` | false / true                     | 1                |
//! | `0xC4`        | binary, u8 length                | 2                |
//! | `0xC6`        | binary, u32 length               | 5                |
//! | `0xCA`/`0xCB` | f32 / f64                        | 5 / 9            |
//! | `0xCC..=0xCF` | u8 / u16 / u32 / u64             | 2 / 3 / 5 / 9    |
//! | `0xD0..=0xD3` | i8 / i16 / i32 / i64             | 2 / 3 / 5 / 9    |
//! | `0xDB`        | string header, u32 length        | 5                |
//! | `0xDD`        | array header, u32 count          | 5                |
//! | `0xDF`        | map header, u32 count            | 5                |
//! | `0xE0..=0xFF` | negative fixint (`-32..=-1`)     | 1                |

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, FormatterError, Result};

pub const NIL: u8 = 0xC0;
pub const PRESENT: u8 = 0xC1;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;
pub const BIN8: u8 = 0xC4;
pub const BIN32: u8 = 0xC6;
pub const FLOAT32: u8 = 0xCA;
pub const FLOAT64: u8 = 0xCB;
pub const UINT8: u8 = 0xCC;
pub const UINT16: u8 = 0xCD;
pub const UINT32: u8 = 0xCE;
pub const UINT64: u8 = 0xCF;
pub const INT8: u8 = 0xD0;
pub const INT16: u8 = 0xD1;
pub const INT32: u8 = 0xD2;
pub const INT64: u8 = 0xD3;
pub const STR32: u8 = 0xDB;
pub const ARRAY32: u8 = 0xDD;
pub const MAP32: u8 = 0xDF;

pub const POSITIVE_FIXINT_MAX: u8 = 0x7F;
pub const NEGATIVE_FIXINT_MIN: u8 = 0xE0;
pub const FIXMAP: u8 = 0x80;
pub const FIXARRAY: u8 = 0x90;
pub const FIXSTR: u8 = 0xA0;

/// Largest count/length encoded in the one-byte array and map headers
pub const FIX_COLLECTION_MAX: usize = 15;
/// Largest length encoded in the one-byte string header
pub const FIX_STR_MAX: usize = 31;
/// Largest length encoded in the two-byte binary header
pub const BIN8_MAX: usize = 255;

/// Worst-case size of any header
pub const MAX_HEADER_LEN: u64 = 5;

pub fn write_nil(buffer: &mut ByteBuffer) -> Result<()> {
    buffer.write_byte(NIL)
}

/// Consume a nil marker if one is next.
pub fn try_read_nil(reader: &mut SequenceReader) -> Result<bool> {
    if reader.peek_u8()? == NIL {
        reader.advance(1)?;
        return Ok(true);
    }
    Ok(false)
}

/// Consume the byte `expected` or fail without moving the cursor.
pub fn expect_code(reader: &mut SequenceReader, expected: u8) -> Result<()> {
    let code = reader.peek_u8()?;
    if code != expected {
        return Err(unexpected_code(reader, code));
    }
    reader.advance(1)
}

/// Decode fault for `code` at the reader's position; nil gets its own reason.
pub fn unexpected_code(reader: &SequenceReader, code: u8) -> FormatterError {
    if code == NIL {
        return reader.fault(ERR_UNEXPECTED_NIL);
    }
    reader.fault_owned(format!("{ERR_UNEXPECTED_CODE}: 0x{code:02X}"))
}

fn u32_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FormatterError::OutOfRange {
        requested: len,
        available: u32::MAX as usize,
    })
}

fn write_header(
    buffer: &mut ByteBuffer,
    len: usize,
    fix_max: usize,
    fix_code: u8,
    wide_code: u8,
) -> Result<()> {
    if len <= fix_max {
        buffer.write_byte(fix_code | len as u8)
    } else {
        buffer.write_tagged(wide_code, &u32_len(len)?.to_be_bytes())
    }
}

fn read_header(
    reader: &mut SequenceReader,
    fix_mask: u8,
    fix_code: u8,
    wide_code: u8,
) -> Result<usize> {
    let code = reader.peek_u8()?;
    if code & fix_mask == fix_code {
        reader.advance(1)?;
        return Ok((code & !fix_mask) as usize);
    }
    if code == wide_code {
        reader.advance(1)?;
        return Ok(u32::from_be_bytes(reader.read_array()?) as usize);
    }
    Err(unexpected_code(reader, code))
}

pub fn array_header_len(count: usize) -> u64 {
    if count <= FIX_COLLECTION_MAX {
        1
    } else {
        5
    }
}

pub fn write_array_header(buffer: &mut ByteBuffer, count: usize) -> Result<()> {
    write_header(buffer, count, FIX_COLLECTION_MAX, FIXARRAY, ARRAY32)
}

/// Read an array header and check it against the configured maximum.
pub fn read_array_header(reader: &mut SequenceReader) -> Result<usize> {
    let count = read_header(reader, 0xF0, FIXARRAY, ARRAY32)?;
    reader.check_collection_len(count)
}

pub fn map_header_len(count: usize) -> u64 {
    array_header_len(count)
}

pub fn write_map_header(buffer: &mut ByteBuffer, count: usize) -> Result<()> {
    write_header(buffer, count, FIX_COLLECTION_MAX, FIXMAP, MAP32)
}

pub fn read_map_header(reader: &mut SequenceReader) -> Result<usize> {
    let count = read_header(reader, 0xF0, FIXMAP, MAP32)?;
    reader.check_collection_len(count)
}

pub fn str_header_len(len: usize) -> u64 {
    if len <= FIX_STR_MAX {
        1
    } else {
        5
    }
}

pub fn write_str(buffer: &mut ByteBuffer, value: &str) -> Result<()> {
    write_header(buffer, value.len(), FIX_STR_MAX, FIXSTR, STR32)?;
    buffer.write(value.as_bytes())
}

pub fn read_str(reader: &mut SequenceReader) -> Result<String> {
    let start = reader.consumed() as u64;
    let len = read_header(reader, 0xE0, FIXSTR, STR32)?;
    if len > reader.remaining() {
        return Err(reader.fault(ERR_UNEXPECTED_END));
    }
    let bytes = reader.read_vec(len)?;
    String::from_utf8(bytes).map_err(|_| FormatterError::decode(start, ERR_INVALID_UTF8))
}

pub fn bin_header_len(len: usize) -> u64 {
    if len <= BIN8_MAX {
        2
    } else {
        5
    }
}

pub fn write_bin(buffer: &mut ByteBuffer, value: &[u8]) -> Result<()> {
    if value.len() <= BIN8_MAX {
        buffer.write_tagged(BIN8, &[value.len() as u8])?;
    } else {
        buffer.write_tagged(BIN32, &u32_len(value.len())?.to_be_bytes())?;
    }
    buffer.write(value)
}

/// Read a binary header; the length is checked against the remaining input.
pub fn read_bin_header(reader: &mut SequenceReader) -> Result<usize> {
    let code = reader.peek_u8()?;
    let len = match code {
        BIN8 => {
            reader.advance(1)?;
            reader.read_u8()? as usize
        }
        BIN32 => {
            reader.advance(1)?;
            u32::from_be_bytes(reader.read_array()?) as usize
        }
        other => return Err(unexpected_code(reader, other)),
    };
    if len > reader.remaining() {
        return Err(reader.fault(ERR_UNEXPECTED_END));
    }
    Ok(len)
}

pub fn read_bin(reader: &mut SequenceReader) -> Result<Vec<u8>> {
    let len = read_bin_header(reader)?;
    reader.read_vec(len)
}
