//! # Sequence Reader
//!
//! Forward cursor over the committed bytes of a [`FrozenSequence`].
//!
//! ## Cursor State
//! - `segment`: index of the current segment
//! - `segment_consumed`: offset inside the current segment
//! - `consumed`: offset across the whole sequence
//!
//! Landing exactly on a segment boundary always moves the cursor to the start of the
//! next segment, so the current segment only looks exhausted at the very end of the
//! sequence. `rewind(k)` after `advance(k)` restores the exact prior position.
//!
//! The reader holds one freeze of its sequence; `dispose` (or drop) gives it up.

use bytes::Buf;

use crate::buffer::segment::SegmentId;
use crate::buffer::sequence::FrozenSequence;
use crate::buffer::view::SequenceView;
use crate::error::{constants::*, FormatterError, Result};
use crate::options::{DepthGuard, SerializerOptions};

/// Cursor over a frozen segment chain
pub struct SequenceReader {
    source: Option<FrozenSequence>,
    segment: usize,
    segment_consumed: usize,
    consumed: usize,
    depth: DepthGuard,
    options: SerializerOptions,
}

impl SequenceReader {
    pub fn new(source: FrozenSequence) -> Self {
        Self::with_options(source, SerializerOptions::default())
    }

    pub fn with_options(source: FrozenSequence, options: SerializerOptions) -> Self {
        let mut reader = Self::detached(options);
        reader.source = Some(source);
        reader.normalize();
        reader
    }

    /// A reader with no sequence attached; every operation reports `Disposed`.
    pub(crate) fn detached(options: SerializerOptions) -> Self {
        Self {
            source: None,
            segment: 0,
            segment_consumed: 0,
            consumed: 0,
            depth: DepthGuard::new(options.max_depth),
            options,
        }
    }

    /// Attach a new sequence and reset the cursor.
    pub(crate) fn attach(&mut self, source: FrozenSequence, options: SerializerOptions) {
        self.source = Some(source);
        self.segment = 0;
        self.segment_consumed = 0;
        self.consumed = 0;
        self.depth = DepthGuard::new(options.max_depth);
        self.options = options;
        self.normalize();
    }

    pub fn is_disposed(&self) -> bool {
        self.source.is_none()
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn depth(&self) -> &DepthGuard {
        &self.depth
    }

    /// Bytes consumed since the start of the sequence
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.len() - self.consumed
    }

    /// Total length of the underlying sequence
    pub fn len(&self) -> usize {
        self.source.as_ref().map_or(0, FrozenSequence::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn current_segment(&self) -> SegmentId {
        SegmentId(self.segment)
    }

    pub fn segment_consumed(&self) -> usize {
        self.segment_consumed
    }

    pub fn sequence(&self) -> Option<&FrozenSequence> {
        self.source.as_ref()
    }

    fn segment_len(&self, index: usize) -> usize {
        self.source
            .as_ref()
            .and_then(|s| s.segments().get(index))
            .map_or(0, |s| s.committed())
    }

    fn segment_count(&self) -> usize {
        self.source.as_ref().map_or(0, FrozenSequence::segment_count)
    }

    /// Step over exhausted segments unless the current one is the last.
    fn normalize(&mut self) {
        let count = self.segment_count();
        while self.segment + 1 < count && self.segment_consumed >= self.segment_len(self.segment)
        {
            self.segment += 1;
            self.segment_consumed = 0;
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.source.is_none() {
            return Err(FormatterError::Disposed);
        }
        Ok(())
    }

    /// Unread bytes of the current segment.
    pub fn current_chunk(&self) -> &[u8] {
        self.source
            .as_ref()
            .and_then(|s| s.segments().get(self.segment))
            .map_or(&[][..], |s| &s.committed_slice()[self.segment_consumed..])
    }

    /// Move forward `count` bytes, crossing segments as needed.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        self.ensure_live()?;
        let remaining = self.remaining();
        if count > remaining {
            return Err(FormatterError::OutOfRange {
                requested: count,
                available: remaining,
            });
        }

        let mut count = count;
        while count > 0 {
            let in_segment = self.segment_len(self.segment) - self.segment_consumed;
            if count < in_segment {
                self.segment_consumed += count;
                self.consumed += count;
                break;
            }
            count -= in_segment;
            self.consumed += in_segment;
            self.segment_consumed += in_segment;
            if self.segment + 1 >= self.segment_count() {
                break;
            }
            self.segment += 1;
            self.segment_consumed = 0;
        }
        self.normalize();
        Ok(())
    }

    /// Move back `count` bytes, crossing segments as needed.
    pub fn rewind(&mut self, count: usize) -> Result<()> {
        self.ensure_live()?;
        if count > self.consumed {
            return Err(FormatterError::OutOfRange {
                requested: count,
                available: self.consumed,
            });
        }

        let mut count = count;
        while count > 0 {
            if self.segment_consumed == 0 {
                // consumed > 0 guarantees a previous segment exists
                self.segment -= 1;
                self.segment_consumed = self.segment_len(self.segment);
                continue;
            }
            let step = count.min(self.segment_consumed);
            self.segment_consumed -= step;
            self.consumed -= step;
            count -= step;
        }
        Ok(())
    }

    /// Next byte without consuming it.
    pub fn try_peek(&self) -> Option<u8> {
        self.current_chunk().first().copied()
    }

    /// Consume one byte.
    pub fn try_read(&mut self) -> Option<u8> {
        let value = self.try_peek()?;
        self.advance(1).ok()?;
        Some(value)
    }

    /// Fill `dst` completely or leave the cursor untouched and return `false`.
    pub fn try_read_exact(&mut self, dst: &mut [u8]) -> bool {
        if self.is_disposed() || self.remaining() < dst.len() {
            return false;
        }
        self.read(dst) == dst.len()
    }

    /// Copy up to `dst.len()` bytes, returning how many were copied.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let chunk = self.current_chunk();
            if chunk.is_empty() {
                break;
            }
            let take = chunk.len().min(dst.len() - copied);
            dst[copied..copied + take].copy_from_slice(&chunk[..take]);
            copied += take;
            if self.advance(take).is_err() {
                break;
            }
        }
        copied
    }

    /// Zero-copy view from the cursor to the end of the sequence.
    pub fn unread_sequence(&self) -> SequenceView<'_> {
        match &self.source {
            Some(source) => source.view_from(SegmentId(self.segment), self.segment_consumed),
            None => SequenceView::empty(),
        }
    }

    /// Give up this reader's freeze on the sequence.
    ///
    /// Returns whether this was the last holder. A second call fails with `Disposed`.
    pub fn dispose(&mut self) -> Result<bool> {
        let source = self.source.take().ok_or(FormatterError::Disposed)?;
        self.segment = 0;
        self.segment_consumed = 0;
        self.consumed = 0;
        Ok(source.try_release())
    }

    /// Run `f` one nesting level deeper.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.depth.enter()?;
        let result = f(self);
        self.depth.leave();
        result
    }

    /// Fail with `Cancelled` once the attached token has fired.
    pub fn check_cancelled(&self) -> Result<()> {
        self.options.check_cancelled()
    }

    /// Validate a collection header count against the configured maximum.
    pub fn check_collection_len(&self, count: usize) -> Result<usize> {
        if count > self.options.max_collection_len {
            return Err(self.fault_owned(format!(
                "{ERR_COLLECTION_TOO_LONG}: {count} > {}",
                self.options.max_collection_len
            )));
        }
        Ok(count)
    }

    /// Decode fault at the current offset.
    pub fn fault(&self, reason: &'static str) -> FormatterError {
        FormatterError::decode(self.consumed as u64, reason)
    }

    pub fn fault_owned(&self, reason: String) -> FormatterError {
        FormatterError::decode_owned(self.consumed as u64, reason)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.ensure_live()?;
        self.try_peek().ok_or_else(|| self.fault(ERR_UNEXPECTED_END))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_live()?;
        self.try_read().ok_or_else(|| self.fault(ERR_UNEXPECTED_END))
    }

    /// Read exactly `N` bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_exact_into(&mut out)?;
        Ok(out)
    }

    /// Fill `dst` or fail with a decode fault, leaving the cursor untouched.
    pub fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.ensure_live()?;
        if !self.try_read_exact(dst) {
            return Err(self.fault(ERR_UNEXPECTED_END));
        }
        Ok(())
    }

    /// Read `len` bytes into a new vector.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_live()?;
        if self.remaining() < len {
            return Err(self.fault(ERR_UNEXPECTED_END));
        }
        let mut out = vec![0u8; len];
        self.read_exact_into(&mut out)?;
        Ok(out)
    }
}

impl std::fmt::Debug for SequenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceReader")
            .field("segment", &self.segment)
            .field("segment_consumed", &self.segment_consumed)
            .field("consumed", &self.consumed)
            .field("remaining", &self.remaining())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Buf for SequenceReader {
    fn remaining(&self) -> usize {
        SequenceReader::remaining(self)
    }

    fn chunk(&self) -> &[u8] {
        self.current_chunk()
    }

    fn advance(&mut self, cnt: usize) {
        let remaining = SequenceReader::remaining(self);
        assert!(
            cnt <= remaining,
            "advance({cnt}) past the end of the sequence ({remaining} bytes left)"
        );
        let _ = SequenceReader::advance(self, cnt);
    }
}
