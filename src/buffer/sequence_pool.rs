//! # Sequence Buffer Pool
//!
//! Recycles the segment arenas of released buffers so steady-state serialization
//! does not reallocate them. Blocks are pooled separately by the [`BlockPool`].
//!
//! ## Usage
//! ```rust
//! use wire_formatter::buffer::{BlockPool, SequenceBufferPool};
//!
//! let pool = SequenceBufferPool::new(BlockPool::default(), 8);
//! let mut buffer = pool.rent(64);
//! buffer.write(b"payload").unwrap();
//! drop(buffer.freeze());
//! assert_eq!(pool.available(), 1);
//! ```

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::buffer::block_pool::BlockPool;
use crate::buffer::segment::Segment;
use crate::buffer::sequence::{SegmentChain, SequenceBuffer};
use crate::utils::metrics::global_metrics;

/// Default number of idle buffer shells kept by a pool
pub const DEFAULT_RETAINED_BUFFERS: usize = 64;

pub(crate) struct PoolShared {
    shells: Mutex<Vec<Vec<Segment>>>,
    max_retained: usize,
}

impl PoolShared {
    /// Take back an emptied segment arena.
    pub(crate) fn recycle(&self, mut shell: Vec<Segment>) {
        shell.clear();
        if let Ok(mut shells) = self.shells.lock() {
            if shells.len() < self.max_retained {
                shells.push(shell);
            }
        }
    }
}

/// Thread-safe pool of [`SequenceBuffer`]s
#[derive(Clone)]
pub struct SequenceBufferPool {
    shared: Arc<PoolShared>,
    blocks: BlockPool,
}

impl SequenceBufferPool {
    pub fn new(blocks: BlockPool, max_retained: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                shells: Mutex::new(Vec::new()),
                max_retained,
            }),
            blocks,
        }
    }

    /// Rent an empty buffer. A non-zero `size_hint` pre-rents the first segment.
    pub fn rent(&self, size_hint: usize) -> SequenceBuffer {
        global_metrics().buffer_rented();
        let shell = self
            .shared
            .shells
            .lock()
            .ok()
            .and_then(|mut shells| shells.pop())
            .unwrap_or_default();

        trace!(size_hint, "Renting sequence buffer");
        let chain = SegmentChain::new(
            shell,
            self.blocks.clone(),
            Some(Arc::downgrade(&self.shared)),
        );
        let mut buffer = SequenceBuffer::from_chain(chain);
        if size_hint > 0 {
            buffer.get_span(size_hint);
        }
        buffer
    }

    /// Idle buffer shells waiting to be rented
    pub fn available(&self) -> usize {
        self.shared.shells.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn block_pool(&self) -> &BlockPool {
        &self.blocks
    }
}

impl Default for SequenceBufferPool {
    fn default() -> Self {
        Self::new(BlockPool::default(), DEFAULT_RETAINED_BUFFERS)
    }
}

impl std::fmt::Debug for SequenceBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBufferPool")
            .field("available", &self.available())
            .field("blocks", &self.blocks)
            .finish()
    }
}
