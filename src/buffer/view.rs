//! # Sequence View
//!
//! Zero-copy, read-only view over a run of committed segment bytes. A view starts at
//! `(segment, offset)` and runs to the end of the last segment's committed region.

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::segment::Segment;

/// Borrowed multi-segment byte sequence
#[derive(Clone, Copy)]
pub struct SequenceView<'a> {
    segments: &'a [Segment],
    start_offset: usize,
    len: usize,
}

impl<'a> SequenceView<'a> {
    /// View from `start_offset` inside `segments[0]` to the end of the last segment.
    pub(crate) fn new(segments: &'a [Segment], start_offset: usize) -> Self {
        let total: usize = segments.iter().map(Segment::committed).sum();
        let start_offset = match segments.first() {
            Some(first) => start_offset.min(first.committed()),
            None => 0,
        };
        Self {
            segments,
            start_offset,
            len: total - start_offset,
        }
    }

    pub fn empty() -> Self {
        Self {
            segments: &[],
            start_offset: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the view spans a single contiguous chunk.
    pub fn is_single_segment(&self) -> bool {
        self.chunks().count() <= 1
    }

    /// The contiguous chunks of the view, in order.
    pub fn chunks(&self) -> Chunks<'a> {
        Chunks {
            segments: self.segments,
            start_offset: self.start_offset,
        }
    }

    /// The first contiguous chunk, empty for an empty view.
    pub fn first_chunk(&self) -> &'a [u8] {
        self.chunks().next().unwrap_or(&[])
    }

    /// Copy the view into `dst`, returning the number of bytes copied.
    pub fn copy_to_slice(&self, dst: &mut [u8]) -> usize {
        let mut written = 0;
        for chunk in self.chunks() {
            if written == dst.len() {
                break;
            }
            let take = chunk.len().min(dst.len() - written);
            dst[written..written + take].copy_from_slice(&chunk[..take]);
            written += take;
        }
        written
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Flatten into a [`Bytes`] handle.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.len);
        for chunk in self.chunks() {
            out.put_slice(chunk);
        }
        out.freeze()
    }
}

impl std::fmt::Debug for SequenceView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceView")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl PartialEq<[u8]> for SequenceView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        if self.len != other.len() {
            return false;
        }
        let mut offset = 0;
        for chunk in self.chunks() {
            if chunk != &other[offset..offset + chunk.len()] {
                return false;
            }
            offset += chunk.len();
        }
        true
    }
}

/// Iterator over the contiguous chunks of a [`SequenceView`]
pub struct Chunks<'a> {
    segments: &'a [Segment],
    start_offset: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (first, rest) = self.segments.split_first()?;
            let chunk = &first.committed_slice()[self.start_offset..];
            self.segments = rest;
            self.start_offset = 0;
            if !chunk.is_empty() {
                return Some(chunk);
            }
        }
    }
}
