//! # Buffer Layer
//!
//! Segmented, pooled storage underneath every formatter.
//!
//! ## Components
//! - **Block Pool**: power-of-two size classes of raw storage
//! - **Segment**: one block plus its committed length, stored in an index-addressed arena
//! - **Sequence Buffer**: growable writer over a segment chain; freezes into a shared
//!   [`FrozenSequence`] whose last holder returns every block
//! - **Byte Buffer**: the formatter write surface (writable → frozen → disposed)
//! - **Sequence Reader**: segment-crossing cursor, plus a pooled variant
//!
//! Pools are thread-safe. A rented buffer or reader is owned by one thread at a time.

pub mod block_pool;
pub mod byte_buffer;
pub mod reader;
pub mod reader_pool;
pub mod segment;
pub mod sequence;
pub mod sequence_pool;
pub mod view;

pub use block_pool::{Block, BlockPool, BlockPoolStats};
pub use byte_buffer::ByteBuffer;
pub use reader::SequenceReader;
pub use reader_pool::{PooledSequenceReader, ReaderPool};
pub use segment::{Segment, SegmentId, SegmentPin};
pub use sequence::{FrozenSequence, SequenceBuffer};
pub use sequence_pool::SequenceBufferPool;
pub use view::{Chunks, SequenceView};
