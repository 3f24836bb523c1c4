//! # Sequence Buffer
//!
//! Growable writer over a chain of pooled segments, plus the frozen, shared form
//! handed to readers.
//!
//! ## Lifecycle
//! 1. Rent a [`SequenceBuffer`] from a [`SequenceBufferPool`] (or build one directly)
//! 2. Write through `get_span` + `advance`, or the `write*` helpers
//! 3. [`SequenceBuffer::freeze`] moves the chain into a [`FrozenSequence`]; every
//!    clone of it is one freeze holder
//! 4. When the last holder drops (or [`FrozenSequence::try_release`] succeeds), every
//!    block goes back to the [`BlockPool`] and the buffer shell to its owning pool
//!
//! Releasing the same holder twice cannot happen: release consumes the holder.
//!
//! [`SequenceBufferPool`]: crate::buffer::sequence_pool::SequenceBufferPool

use std::sync::{Arc, Weak};

use bytes::buf::UninitSlice;
use bytes::BufMut;
use tracing::trace;

use crate::buffer::block_pool::BlockPool;
use crate::buffer::segment::{Segment, SegmentId};
use crate::buffer::sequence_pool::PoolShared;
use crate::buffer::view::SequenceView;
use crate::error::{FormatterError, Result};
use crate::utils::metrics::global_metrics;

/// Owned chain of segments; returns its storage when dropped.
pub(crate) struct SegmentChain {
    segments: Vec<Segment>,
    committed: usize,
    blocks: BlockPool,
    owner: Option<Weak<PoolShared>>,
}

impl SegmentChain {
    pub(crate) fn new(
        segments: Vec<Segment>,
        blocks: BlockPool,
        owner: Option<Weak<PoolShared>>,
    ) -> Self {
        let committed = segments.iter().map(Segment::committed).sum();
        Self {
            segments,
            committed,
            blocks,
            owner,
        }
    }

    fn release_blocks(&mut self) {
        for segment in self.segments.drain(..) {
            self.blocks.try_release(segment.into_block());
        }
        self.committed = 0;
    }
}

impl Drop for SegmentChain {
    fn drop(&mut self) {
        self.release_blocks();
        global_metrics().buffer_released();
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.recycle(std::mem::take(&mut self.segments));
        }
    }
}

/// Writer over a chain of pooled segments
pub struct SequenceBuffer {
    chain: SegmentChain,
}

impl SequenceBuffer {
    /// Create an unpooled buffer drawing blocks from `blocks`.
    pub fn new(blocks: BlockPool) -> Self {
        Self {
            chain: SegmentChain::new(Vec::new(), blocks, None),
        }
    }

    pub(crate) fn from_chain(chain: SegmentChain) -> Self {
        Self { chain }
    }

    /// Total committed bytes across every segment
    pub fn committed(&self) -> usize {
        self.chain.committed
    }

    pub fn is_empty(&self) -> bool {
        self.chain.committed == 0
    }

    /// Total capacity across every segment
    pub fn capacity(&self) -> usize {
        self.chain.segments.iter().map(Segment::capacity).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.chain.segments.len()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.chain.segments.get(id.index())
    }

    pub fn block_pool(&self) -> &BlockPool {
        &self.chain.blocks
    }

    /// Writable window of at least `max(size_hint, 1)` bytes in the tail segment.
    ///
    /// A new segment is appended when the tail cannot satisfy the hint. A tail that
    /// has nothing committed yet is replaced rather than left empty in the chain.
    pub fn get_span(&mut self, size_hint: usize) -> &mut [u8] {
        let hint = size_hint.max(1);
        let needs_segment = self
            .chain
            .segments
            .last()
            .map_or(true, |tail| tail.available() < hint);

        if needs_segment {
            if self.chain.segments.last().is_some_and(Segment::is_empty) {
                if let Some(empty) = self.chain.segments.pop() {
                    self.chain.blocks.try_release(empty.into_block());
                }
            }
            let block = self.chain.blocks.rent(hint);
            trace!(
                capacity = block.capacity(),
                running_index = self.chain.committed,
                "Appending segment"
            );
            self.chain
                .segments
                .push(Segment::new(block, self.chain.committed));
        }

        match self.chain.segments.last_mut() {
            Some(tail) => tail.tail_mut(),
            None => &mut [],
        }
    }

    /// Tail window if it has any room left, otherwise a fresh segment sized for `hint`.
    fn writable_tail(&mut self, hint: usize) -> &mut [u8] {
        let has_room = self
            .chain
            .segments
            .last()
            .is_some_and(|tail| tail.available() > 0);
        if has_room {
            match self.chain.segments.last_mut() {
                Some(tail) => tail.tail_mut(),
                None => &mut [],
            }
        } else {
            self.get_span(hint)
        }
    }

    /// Commit `count` bytes written into the last window returned by `get_span`.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        match self.chain.segments.last_mut() {
            Some(tail) => tail.advance(count)?,
            None if count == 0 => return Ok(()),
            None => {
                return Err(FormatterError::OutOfRange {
                    requested: count,
                    available: 0,
                })
            }
        }
        self.chain.committed += count;
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        let span = self.get_span(1);
        span[0] = value;
        self.advance(1)
    }

    /// Copy `src` in, spilling across as many segments as needed.
    pub fn write(&mut self, mut src: &[u8]) -> Result<()> {
        let max_hint = self.chain.blocks.max_block_size();
        while !src.is_empty() {
            let span = self.writable_tail(src.len().min(max_hint));
            let count = span.len().min(src.len());
            span[..count].copy_from_slice(&src[..count]);
            self.advance(count)?;
            src = &src[count..];
        }
        Ok(())
    }

    pub fn write_sequence(&mut self, view: &SequenceView<'_>) -> Result<()> {
        for chunk in view.chunks() {
            self.write(chunk)?;
        }
        Ok(())
    }

    /// Zero-copy view of every committed byte.
    pub fn committed_sequence(&self) -> SequenceView<'_> {
        SequenceView::new(&self.chain.segments, 0)
    }

    /// Return every block to the pool and start over.
    pub fn reset(&mut self) {
        self.chain.release_blocks();
    }

    /// Stop writing and share the committed bytes with readers.
    pub fn freeze(mut self) -> FrozenSequence {
        if self.chain.segments.last().is_some_and(Segment::is_empty) {
            if let Some(empty) = self.chain.segments.pop() {
                self.chain.blocks.try_release(empty.into_block());
            }
        }
        global_metrics().buffer_frozen();
        FrozenSequence {
            chain: Arc::new(self.chain),
        }
    }
}

impl std::fmt::Debug for SequenceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBuffer")
            .field("committed", &self.chain.committed)
            .field("segments", &self.chain.segments.len())
            .finish()
    }
}

// SAFETY: `chunk_mut` hands out initialised memory owned by the tail segment and
// `advance_mut` only commits bytes inside that window.
unsafe impl BufMut for SequenceBuffer {
    fn remaining_mut(&self) -> usize {
        usize::MAX - self.chain.committed
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        let available = self
            .chain
            .segments
            .last()
            .map_or(0, Segment::available);
        assert!(
            cnt <= available,
            "advance_mut({cnt}) past the writable window of {available} bytes"
        );
        let _ = self.advance(cnt);
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(self.writable_tail(1))
    }
}

/// Read-only, shared form of a [`SequenceBuffer`]
///
/// Each clone is one freeze holder. Storage goes back to the pools when the last
/// holder is dropped.
#[derive(Clone)]
pub struct FrozenSequence {
    chain: Arc<SegmentChain>,
}

impl FrozenSequence {
    /// Total committed bytes
    pub fn len(&self) -> usize {
        self.chain.committed
    }

    pub fn is_empty(&self) -> bool {
        self.chain.committed == 0
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.chain.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.chain.segments.get(id.index())
    }

    pub fn segment_count(&self) -> usize {
        self.chain.segments.len()
    }

    /// Number of live holders of this sequence
    pub fn freeze_count(&self) -> usize {
        Arc::strong_count(&self.chain)
    }

    /// Zero-copy view of every committed byte.
    pub fn committed_sequence(&self) -> SequenceView<'_> {
        SequenceView::new(&self.chain.segments, 0)
    }

    /// View from `(segment, offset)` to the end of the sequence.
    pub fn view_from(&self, segment: SegmentId, offset: usize) -> SequenceView<'_> {
        match self.chain.segments.get(segment.index()..) {
            Some(rest) => SequenceView::new(rest, offset),
            None => SequenceView::empty(),
        }
    }

    /// Give up this holder. Returns `true` when it was the last one and the
    /// storage went back to the pools.
    pub fn try_release(self) -> bool {
        Arc::into_inner(self.chain).is_some()
    }
}

impl std::fmt::Debug for FrozenSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrozenSequence")
            .field("len", &self.len())
            .field("segments", &self.segment_count())
            .field("freeze_count", &self.freeze_count())
            .finish()
    }
}
