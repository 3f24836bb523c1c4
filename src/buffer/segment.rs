//! # Segment
//!
//! A segment wraps one [`Block`] and tracks how much of it has been committed.
//! Segments live in an arena (`Vec<Segment>`) owned by their chain and are addressed
//! by [`SegmentId`]; `next`/`prev` are neighbouring indices, so there are no
//! ownership cycles between segments.
//!
//! ## Invariants
//! - `committed` never decreases while the segment is part of a chain
//! - only the tail segment of a chain may still grow

use std::marker::PhantomData;

use crate::buffer::block_pool::Block;
use crate::error::{FormatterError, Result};

/// Stable index of a segment inside its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub(crate) usize);

impl SegmentId {
    pub const fn new(index: usize) -> Self {
        SegmentId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn next(self) -> SegmentId {
        SegmentId(self.0 + 1)
    }

    /// Previous segment, or `None` for the first segment.
    pub fn prev(self) -> Option<SegmentId> {
        self.0.checked_sub(1).map(SegmentId)
    }
}

/// One block plus its committed length
pub struct Segment {
    block: Block,
    committed: usize,
    running_index: usize,
}

impl Segment {
    pub(crate) fn new(block: Block, running_index: usize) -> Self {
        Self {
            block,
            committed: 0,
            running_index,
        }
    }

    /// Wrap a block whose first `committed` bytes already hold data.
    pub(crate) fn with_committed(block: Block, committed: usize, running_index: usize) -> Self {
        let committed = committed.min(block.capacity());
        Self {
            block,
            committed,
            running_index,
        }
    }

    /// Bytes written so far
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Bytes still writable
    pub fn available(&self) -> usize {
        self.block.capacity() - self.committed
    }

    pub fn capacity(&self) -> usize {
        self.block.capacity()
    }

    /// Buffer-wide offset of this segment's first byte
    pub fn running_index(&self) -> usize {
        self.running_index
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// The committed region.
    pub fn committed_slice(&self) -> &[u8] {
        &self.block.as_slice()[..self.committed]
    }

    /// The writable tail region.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        let committed = self.committed;
        &mut self.block.as_mut_slice()[committed..]
    }

    /// Commit `count` more bytes of the tail region.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        let available = self.available();
        if count > available {
            return Err(FormatterError::OutOfRange {
                requested: count,
                available,
            });
        }
        self.committed += count;
        Ok(())
    }

    /// Expose a stable address of the committed region for interop.
    ///
    /// The address stays valid for as long as the returned guard lives; dropping the
    /// guard unpins the segment.
    pub fn pin(&self) -> SegmentPin<'_> {
        SegmentPin {
            ptr: self.block.as_slice().as_ptr(),
            len: self.committed,
            _segment: PhantomData,
        }
    }

    pub(crate) fn into_block(self) -> Block {
        self.block
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("committed", &self.committed)
            .field("available", &self.available())
            .field("running_index", &self.running_index)
            .finish()
    }
}

/// Pinned view of a segment's committed bytes
pub struct SegmentPin<'a> {
    ptr: *const u8,
    len: usize,
    _segment: PhantomData<&'a Segment>,
}

impl SegmentPin<'_> {
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_advance_within_capacity() {
        let mut segment = Segment::new(Block::unpooled(8), 0);
        segment.tail_mut()[..3].copy_from_slice(b"abc");
        segment.advance(3).unwrap();
        assert_eq!(segment.committed(), 3);
        assert_eq!(segment.available(), 5);
        assert_eq!(segment.committed_slice(), b"abc");
    }

    #[test]
    fn test_segment_advance_out_of_range() {
        let mut segment = Segment::new(Block::unpooled(4), 0);
        segment.advance(3).unwrap();
        match segment.advance(2) {
            Err(FormatterError::OutOfRange {
                requested: 2,
                available: 1,
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(segment.committed(), 3);
    }

    #[test]
    fn test_pin_is_stable() {
        let mut segment = Segment::new(Block::unpooled(16), 0);
        segment.advance(4).unwrap();
        let first = segment.pin().as_ptr();
        let second = segment.pin();
        assert_eq!(first, second.as_ptr());
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_segment_id_links() {
        let id = SegmentId(0);
        assert_eq!(id.next(), SegmentId(1));
        assert_eq!(id.prev(), None);
        assert_eq!(SegmentId(3).prev(), Some(SegmentId(2)));
    }
}
