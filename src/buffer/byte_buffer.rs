//! # Byte Buffer
//!
//! The write surface used by formatters. A `ByteBuffer` wraps exactly one sequence
//! buffer and moves through three states:
//!
//! ```text
//! Writable ──freeze()/reader()──▶ Frozen ──dispose()──▶ Disposed
//!     └──────────────dispose()──────────────────────────▲
//! ```
//!
//! - Writes on a frozen buffer fail with `Frozen`
//! - Any use after dispose fails with `Disposed`
//! - Dropping the buffer in any state returns its storage to the pools once no
//!   reader still holds a freeze
//!
//! ## Usage
//! ```rust
//! use wire_formatter::buffer::{ByteBuffer, SequenceBufferPool};
//!
//! let pool = SequenceBufferPool::default();
//! let mut buffer = ByteBuffer::new(&pool, 16);
//! buffer.write(b"hi").unwrap();
//! let mut reader = buffer.reader().unwrap();
//! assert_eq!(reader.read_u8().unwrap(), b'h');
//! assert!(buffer.write(b"!").is_err());
//! ```

use std::fmt;

use bytes::Bytes;

use crate::buffer::block_pool::{Block, BlockPool};
use crate::buffer::reader::SequenceReader;
use crate::buffer::segment::Segment;
use crate::buffer::sequence::{FrozenSequence, SegmentChain, SequenceBuffer};
use crate::buffer::sequence_pool::SequenceBufferPool;
use crate::buffer::view::SequenceView;
use crate::error::{FormatterError, Result};
use crate::options::{DepthGuard, SerializerOptions};

/// Bytes per line of the hex dump
const HEX_DUMP_WIDTH: usize = 16;

enum State {
    Writable(SequenceBuffer),
    Frozen(FrozenSequence),
    Disposed,
}

/// Byte-specialized facade over a [`SequenceBuffer`]
pub struct ByteBuffer {
    state: State,
    depth: DepthGuard,
    options: SerializerOptions,
}

impl ByteBuffer {
    /// Rent an empty buffer from `pool`, pre-sized for `size_hint` bytes.
    pub fn new(pool: &SequenceBufferPool, size_hint: usize) -> Self {
        Self::from_sequence(pool.rent(size_hint), SerializerOptions::default())
    }

    pub fn with_options(
        pool: &SequenceBufferPool,
        size_hint: usize,
        options: SerializerOptions,
    ) -> Self {
        Self::from_sequence(pool.rent(size_hint), options)
    }

    pub fn from_sequence(sequence: SequenceBuffer, options: SerializerOptions) -> Self {
        Self {
            state: State::Writable(sequence),
            depth: DepthGuard::new(options.max_depth),
            options,
        }
    }

    /// Copy `bytes` into a new single-segment buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::from_block(Block::from_vec(bytes.to_vec()), bytes.len())
    }

    /// Copy a (possibly multi-segment) view into a buffer rented from `pool`.
    pub fn from_view(pool: &SequenceBufferPool, view: &SequenceView<'_>) -> Result<Self> {
        let mut sequence = pool.rent(view.len());
        sequence.write_sequence(view)?;
        Ok(Self::from_sequence(sequence, SerializerOptions::default()))
    }

    /// Wrap an existing block whose first `committed` bytes hold data.
    ///
    /// The block and any segments grown after it are freed on drop, never
    /// handed to a shared pool.
    pub fn from_block(block: Block, committed: usize) -> Self {
        let segments = vec![Segment::with_committed(block, committed, 0)];
        let chain = SegmentChain::new(segments, BlockPool::unretained(), None);
        Self::from_sequence(SequenceBuffer::from_chain(chain), SerializerOptions::default())
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SerializerOptions) {
        self.depth = DepthGuard::new(options.max_depth);
        self.options = options;
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, State::Frozen(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }

    /// Committed bytes; zero once disposed.
    pub fn len(&self) -> usize {
        match &self.state {
            State::Writable(sequence) => sequence.committed(),
            State::Frozen(frozen) => frozen.len(),
            State::Disposed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn writer(&mut self) -> Result<&mut SequenceBuffer> {
        match &mut self.state {
            State::Writable(sequence) => Ok(sequence),
            State::Frozen(_) => Err(FormatterError::Frozen),
            State::Disposed => Err(FormatterError::Disposed),
        }
    }

    pub fn get_span(&mut self, size_hint: usize) -> Result<&mut [u8]> {
        Ok(self.writer()?.get_span(size_hint))
    }

    /// Alias of [`get_span`](Self::get_span); both hand out the same window.
    pub fn get_memory(&mut self, size_hint: usize) -> Result<&mut [u8]> {
        self.get_span(size_hint)
    }

    pub fn advance(&mut self, count: usize) -> Result<()> {
        self.writer()?.advance(count)
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.writer()?.write_byte(value)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer()?.write(bytes)
    }

    pub fn write_sequence(&mut self, view: &SequenceView<'_>) -> Result<()> {
        self.writer()?.write_sequence(view)
    }

    /// Write a one-byte code followed by its payload in a single window.
    pub fn write_tagged(&mut self, code: u8, payload: &[u8]) -> Result<()> {
        let writer = self.writer()?;
        let total = payload.len() + 1;
        let span = writer.get_span(total);
        span[0] = code;
        span[1..total].copy_from_slice(payload);
        writer.advance(total)
    }

    /// Run `f` one nesting level deeper.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.depth.enter()?;
        let result = f(self);
        self.depth.leave();
        result
    }

    /// Stop accepting writes and return a freeze holder on the committed bytes.
    ///
    /// Idempotent: every call on a frozen buffer returns another holder.
    pub fn freeze(&mut self) -> Result<FrozenSequence> {
        match std::mem::replace(&mut self.state, State::Disposed) {
            State::Writable(sequence) => {
                let frozen = sequence.freeze();
                self.state = State::Frozen(frozen.clone());
                Ok(frozen)
            }
            State::Frozen(frozen) => {
                self.state = State::Frozen(frozen.clone());
                Ok(frozen)
            }
            State::Disposed => Err(FormatterError::Disposed),
        }
    }

    /// Freeze the buffer and open a reader over it.
    pub fn reader(&mut self) -> Result<SequenceReader> {
        let frozen = self.freeze()?;
        Ok(SequenceReader::with_options(frozen, self.options.clone()))
    }

    /// Zero-copy view of the committed bytes.
    pub fn as_view(&self) -> Result<SequenceView<'_>> {
        match &self.state {
            State::Writable(sequence) => Ok(sequence.committed_sequence()),
            State::Frozen(frozen) => Ok(frozen.committed_sequence()),
            State::Disposed => Err(FormatterError::Disposed),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.as_view()?.to_vec())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(self.as_view()?.to_bytes())
    }

    /// Release the buffer. Returns whether the storage went back to the pools now
    /// (`false` while a reader still holds a freeze).
    pub fn dispose(&mut self) -> Result<bool> {
        match std::mem::replace(&mut self.state, State::Disposed) {
            State::Writable(sequence) => {
                drop(sequence);
                Ok(true)
            }
            State::Frozen(frozen) => Ok(frozen.try_release()),
            State::Disposed => Err(FormatterError::Disposed),
        }
    }
}

impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(view) = self.as_view() else {
            return write!(f, "ByteBuffer(disposed)");
        };
        write!(f, "ByteBuffer({} bytes)", view.len())?;
        let bytes = view.to_vec();
        for (line, chunk) in bytes.chunks(HEX_DUMP_WIDTH).enumerate() {
            write!(f, "\n{:08x}  {}", line * HEX_DUMP_WIDTH, hex::encode(chunk))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Writable(_) => "writable",
            State::Frozen(_) => "frozen",
            State::Disposed => "disposed",
        };
        f.debug_struct("ByteBuffer")
            .field("state", &state)
            .field("len", &self.len())
            .field("depth", &self.depth.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_freeze_blocks_writes() {
        let pool = SequenceBufferPool::new(BlockPool::fixed(8, 8), 4);
        let mut buffer = ByteBuffer::new(&pool, 0);
        buffer.write_tagged(0xCD, &[0x01, 0x02]).unwrap();
        buffer.freeze().unwrap();
        assert!(matches!(buffer.write_byte(1), Err(FormatterError::Frozen)));
        assert_eq!(buffer.to_vec().unwrap(), vec![0xCD, 0x01, 0x02]);
    }

    #[test]
    fn test_dispose_then_use_fails() {
        let mut buffer = ByteBuffer::from_slice(b"abc");
        assert!(buffer.dispose().unwrap());
        assert!(matches!(buffer.write(b"x"), Err(FormatterError::Disposed)));
        assert!(matches!(buffer.reader(), Err(FormatterError::Disposed)));
        assert!(matches!(buffer.dispose(), Err(FormatterError::Disposed)));
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_reader_keeps_storage_alive() {
        let pool = SequenceBufferPool::new(BlockPool::fixed(8, 8), 4);
        let mut buffer = ByteBuffer::new(&pool, 0);
        buffer.write(b"payload").unwrap();
        let mut reader = buffer.reader().unwrap();
        assert!(!buffer.dispose().unwrap());
        assert_eq!(pool.available(), 0);
        assert_eq!(reader.read_vec(7).unwrap(), b"payload");
        assert!(reader.dispose().unwrap());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_from_view_copies_across_segments() {
        let pool = SequenceBufferPool::new(BlockPool::fixed(4, 8), 4);
        let mut source = ByteBuffer::new(&pool, 0);
        source.write(b"0123456789").unwrap();
        let copy = ByteBuffer::from_view(&pool, &source.as_view().unwrap()).unwrap();
        assert_eq!(copy.to_vec().unwrap(), b"0123456789");
    }

    #[test]
    fn test_from_block_storage_not_pooled() {
        let mut block = Block::unpooled(4096);
        block.as_mut_slice()[..3].copy_from_slice(b"own");
        let mut buffer = ByteBuffer::from_block(block, 3);
        buffer.write(b"ed").unwrap();
        match &buffer.state {
            State::Writable(sequence) => {
                let pool = sequence.block_pool();
                assert!(!pool.try_release(Block::unpooled(4096)));
                assert_eq!(pool.available(), 0);
            }
            _ => panic!("expected a writable buffer"),
        }
        assert_eq!(buffer.to_vec().unwrap(), b"owned");
        assert!(buffer.dispose().unwrap());
    }

    #[test]
    fn test_hex_dump() {
        let buffer = ByteBuffer::from_slice(&[0xC0, 0xA1, 0x41]);
        assert_eq!(buffer.to_string(), "ByteBuffer(3 bytes)\n00000000  c0a141");
    }

    #[test]
    fn test_nested_depth_limit() {
        let pool = SequenceBufferPool::default();
        let options = SerializerOptions::default().with_max_depth(1);
        let mut buffer = ByteBuffer::with_options(&pool, 0, options);
        let result = buffer.nested(|b| b.nested(|_| Ok(())));
        assert!(matches!(
            result,
            Err(FormatterError::DepthExceeded { depth: 2, max: 1 })
        ));
        buffer.nested(|_| Ok(())).unwrap();
    }
}
