//! # Serializer Facade
//!
//! [`WireSerializer`] ties a [`Resolver`] to buffer and reader pools and a set of
//! [`SerializerOptions`]. It is the surface the networking and persistence layers
//! call: value in, pooled [`ByteBuffer`] or `Vec<u8>` out, and back.
//!
//! ## Usage
//! ```rust
//! use wire_formatter::WireSerializer;
//!
//! let serializer = WireSerializer::new();
//! let bytes = serializer.serialize_to_vec(&vec![1u16, 2, 3]).unwrap();
//! let decoded: Vec<u16> = serializer.deserialize(&bytes).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```
//!
//! `deserialize` and `deserialize_buffer` require the input to hold exactly one
//! value; `deserialize_from` reads one value and leaves the reader positioned after
//! it, for streams of back-to-back values.

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::buffer::{BlockPool, ByteBuffer, ReaderPool, SequenceBufferPool, SequenceReader};
use crate::config::{FormatterConfig, DEFAULT_INITIAL_BUFFER_HINT};
use crate::error::{constants::ERR_TRAILING_BYTES, FormatterError, Result};
use crate::format::{Formattable, Formatter};
use crate::options::SerializerOptions;
use crate::resolver::Resolver;
use crate::utils::metrics::global_metrics;

static DEFAULT_SERIALIZER: Lazy<WireSerializer> = Lazy::new(WireSerializer::new);

/// Pooled serialize/deserialize entry point
#[derive(Debug, Clone)]
pub struct WireSerializer {
    resolver: Resolver,
    buffers: SequenceBufferPool,
    readers: ReaderPool,
    options: SerializerOptions,
    initial_buffer_hint: usize,
}

impl WireSerializer {
    /// Default pools and limits over the global resolver.
    pub fn new() -> Self {
        Self {
            resolver: Resolver::global().clone(),
            buffers: SequenceBufferPool::default(),
            readers: ReaderPool::default(),
            options: SerializerOptions::default(),
            initial_buffer_hint: DEFAULT_INITIAL_BUFFER_HINT,
        }
    }

    /// Build pools and limits from a validated configuration.
    pub fn from_config(config: &FormatterConfig) -> Result<Self> {
        config.validate_strict()?;
        let pool = &config.pool;
        let blocks = BlockPool::new(
            pool.min_block_size,
            pool.max_block_size,
            pool.max_retained_blocks_per_class,
        );
        Ok(Self {
            resolver: Resolver::global().clone(),
            buffers: SequenceBufferPool::new(blocks, pool.max_retained_buffers),
            readers: ReaderPool::new(pool.max_retained_readers),
            options: config.serializer.options(),
            initial_buffer_hint: config.serializer.initial_buffer_hint,
        })
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Abort collection decodes once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options = self.options.with_cancellation(token);
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn buffer_pool(&self) -> &SequenceBufferPool {
        &self.buffers
    }

    pub fn reader_pool(&self) -> &ReaderPool {
        &self.readers
    }

    /// Serialize into a buffer rented from this serializer's pool.
    pub fn serialize<T: Formattable>(&self, value: &T) -> Result<ByteBuffer> {
        let formatter = self.resolver.get_formatter::<T>()?;
        self.serialize_with(formatter.as_ref(), value)
    }

    pub fn serialize_to_vec<T: Formattable>(&self, value: &T) -> Result<Vec<u8>> {
        let mut buffer = self.serialize(value)?;
        let bytes = buffer.to_vec()?;
        buffer.dispose()?;
        Ok(bytes)
    }

    /// Serialize with an explicit formatter, such as one from [`Resolver::resolve`].
    pub fn serialize_with<T>(
        &self,
        formatter: &dyn Formatter<T>,
        value: &T,
    ) -> Result<ByteBuffer> {
        // Larger values continue in further segments.
        let hint = usize::try_from(formatter.get_length(value))
            .unwrap_or(usize::MAX)
            .clamp(1, self.buffers.block_pool().max_block_size());
        let mut buffer = ByteBuffer::with_options(&self.buffers, hint, self.options.clone());
        formatter.serialize(&mut buffer, value)?;
        global_metrics().value_serialized(buffer.len() as u64);
        Ok(buffer)
    }

    /// Rent an empty buffer with this serializer's options, for writing several
    /// values back to back with [`serialize_into`](Self::serialize_into).
    pub fn rent_buffer(&self) -> ByteBuffer {
        ByteBuffer::with_options(&self.buffers, self.initial_buffer_hint, self.options.clone())
    }

    /// Append `value` to `buffer`.
    pub fn serialize_into<T: Formattable>(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        let formatter = self.resolver.get_formatter::<T>()?;
        let start = buffer.len();
        formatter.serialize(buffer, value)?;
        global_metrics().value_serialized((buffer.len() - start) as u64);
        Ok(())
    }

    /// Decode exactly one value from `bytes`.
    pub fn deserialize<T: Formattable>(&self, bytes: &[u8]) -> Result<T> {
        let formatter = self.resolver.get_formatter::<T>()?;
        self.deserialize_with(formatter.as_ref(), bytes)
    }

    /// Decode exactly one value from `bytes` with an explicit formatter.
    pub fn deserialize_with<T>(&self, formatter: &dyn Formatter<T>, bytes: &[u8]) -> Result<T> {
        let result = self.decode_bytes(formatter, bytes);
        self.observe(result, bytes.len())
    }

    fn decode_bytes<T>(&self, formatter: &dyn Formatter<T>, bytes: &[u8]) -> Result<T> {
        let mut sequence = self.buffers.rent(bytes.len());
        sequence.write(bytes)?;
        let mut pooled = self
            .readers
            .rent_with_options(sequence.freeze(), self.options.clone());
        let value = read_whole(formatter, pooled.reader()?);
        pooled.dispose()?;
        value
    }

    /// Decode one value at the reader's position, leaving any bytes after it unread.
    pub fn deserialize_from<T: Formattable>(&self, reader: &mut SequenceReader) -> Result<T> {
        let formatter = self.resolver.get_formatter::<T>()?;
        let start = reader.consumed();
        let result = formatter.deserialize(reader);
        self.observe(result, reader.consumed().saturating_sub(start))
    }

    /// Freeze `buffer` and decode exactly one value from it.
    pub fn deserialize_buffer<T: Formattable>(&self, buffer: &mut ByteBuffer) -> Result<T> {
        let formatter = self.resolver.get_formatter::<T>()?;
        let len = buffer.len();
        let result = buffer.reader().and_then(|mut reader| {
            let value = read_whole(formatter.as_ref(), &mut reader);
            reader.dispose()?;
            value
        });
        self.observe(result, len)
    }

    /// Encoded size of `value`: exact for fixed-width types, an upper bound otherwise.
    pub fn get_length<T: Formattable>(&self, value: &T) -> Result<u64> {
        Ok(self.resolver.get_formatter::<T>()?.get_length(value))
    }

    fn observe<T>(&self, result: Result<T>, byte_count: usize) -> Result<T> {
        match &result {
            Ok(_) => global_metrics().value_deserialized(byte_count as u64),
            Err(e) if e.is_decode_fault() => {
                global_metrics().decode_fault();
                warn!(
                    error = %e,
                    type_name = std::any::type_name::<T>(),
                    "Decode fault"
                );
            }
            Err(e) => {
                global_metrics().decode_failed();
                debug!(
                    error = %e,
                    type_name = std::any::type_name::<T>(),
                    "Decode failed"
                );
            }
        }
        result
    }
}

impl Default for WireSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn read_whole<T>(formatter: &dyn Formatter<T>, reader: &mut SequenceReader) -> Result<T> {
    let value = formatter.deserialize(reader)?;
    if !reader.is_end() {
        return Err(FormatterError::decode(
            reader.consumed() as u64,
            ERR_TRAILING_BYTES,
        ));
    }
    Ok(value)
}

/// Shared serializer used by the crate-level functions
pub fn default_serializer() -> &'static WireSerializer {
    &DEFAULT_SERIALIZER
}

/// Serialize `value` with the default serializer.
pub fn serialize<T: Formattable>(value: &T) -> Result<ByteBuffer> {
    default_serializer().serialize(value)
}

pub fn serialize_to_vec<T: Formattable>(value: &T) -> Result<Vec<u8>> {
    default_serializer().serialize_to_vec(value)
}

/// Decode exactly one `T` from `bytes` with the default serializer.
pub fn deserialize<T: Formattable>(bytes: &[u8]) -> Result<T> {
    default_serializer().deserialize(bytes)
}

pub fn get_length<T: Formattable>(value: &T) -> Result<u64> {
    default_serializer().get_length(value)
}
