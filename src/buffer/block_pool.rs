//! # Block Pool
//!
//! Thread-safe pool of fixed-capacity raw storage blocks. Segments rent blocks on
//! demand and hand them back when their buffer is released.
//!
//! ## Size Classes
//! - Capacities are powers of two between `min_block_size` and `max_block_size`
//! - A hint is rounded up to the smallest class that satisfies it
//! - Hints above the largest class get an unpooled block of exactly that size
//!
//! ## Ownership
//! A [`Block`] has exactly one owner at a time (the segment holding it). Releasing a
//! block moves it back into the pool; a block the pool refuses is simply dropped,
//! which leaks it from the pool's perspective but is never an error.
//!
//! ## Usage
//! ```rust
//! use wire_formatter::buffer::block_pool::BlockPool;
//!
//! let pool = BlockPool::new(256, 64 * 1024, 16);
//! let block = pool.rent(300);
//! assert_eq!(block.capacity(), 512);
//! assert!(pool.try_release(block));
//! assert_eq!(pool.available(), 1);
//! ```

use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

use crate::utils::metrics::global_metrics;

/// Smallest block handed out by the default pool (4KB)
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 4096;

/// Largest pooled block of the default pool (1MB)
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1024 * 1024;

/// Default number of idle blocks kept per size class
pub const DEFAULT_RETAINED_PER_CLASS: usize = 32;

/// A raw storage unit rented from a [`BlockPool`].
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Allocate a zeroed block outside of any pool.
    pub fn unpooled(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Wrap existing bytes; the block's capacity is the slice length.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: data.into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Point-in-time view of a pool's idle storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockPoolStats {
    pub classes: usize,
    pub idle_blocks: usize,
    pub idle_bytes: usize,
}

struct SizeClass {
    capacity: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

struct PoolInner {
    classes: Vec<SizeClass>,
    retained_per_class: usize,
}

/// Thread-safe pool of [`Block`]s organised by power-of-two size class
#[derive(Clone)]
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

impl BlockPool {
    /// Create a pool whose classes span `min_block_size..=max_block_size`.
    ///
    /// Both bounds are rounded up to powers of two; `max_block_size` is raised to
    /// `min_block_size` when smaller.
    pub fn new(min_block_size: usize, max_block_size: usize, retained_per_class: usize) -> Self {
        let min = min_block_size.max(1).next_power_of_two();
        let max = max_block_size.max(min).next_power_of_two();

        let mut classes = Vec::new();
        let mut capacity = min;
        while capacity <= max {
            classes.push(SizeClass {
                capacity,
                free: Mutex::new(Vec::new()),
            });
            capacity <<= 1;
        }

        Self {
            inner: Arc::new(PoolInner {
                classes,
                retained_per_class,
            }),
        }
    }

    /// Create a pool with a single class of exactly `block_size` bytes.
    ///
    /// Hints larger than `block_size` receive unpooled blocks.
    pub fn fixed(block_size: usize, retained: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                classes: vec![SizeClass {
                    capacity: block_size.max(1),
                    free: Mutex::new(Vec::new()),
                }],
                retained_per_class: retained,
            }),
        }
    }

    /// Capacity of the class that serves `size_hint`, or `None` when the hint is
    /// above every class.
    pub fn class_capacity(&self, size_hint: usize) -> Option<usize> {
        self.class_index(size_hint)
            .map(|index| self.inner.classes[index].capacity)
    }

    /// Smallest capacity this pool hands out.
    pub fn min_block_size(&self) -> usize {
        self.inner.classes.first().map(|c| c.capacity).unwrap_or(1)
    }

    /// Largest pooled capacity.
    pub fn max_block_size(&self) -> usize {
        self.inner.classes.last().map(|c| c.capacity).unwrap_or(1)
    }

    fn class_index(&self, size_hint: usize) -> Option<usize> {
        self.inner
            .classes
            .iter()
            .position(|class| class.capacity >= size_hint)
    }

    /// Rent a block with capacity of at least `size_hint` bytes.
    pub fn rent(&self, size_hint: usize) -> Block {
        let metrics = global_metrics();
        metrics.block_rented();

        let Some(index) = self.class_index(size_hint) else {
            trace!(size_hint, "Allocating unpooled oversize block");
            return Block::unpooled(size_hint);
        };

        let class = &self.inner.classes[index];
        let reused = class.free.lock().ok().and_then(|mut free| free.pop());
        match reused {
            Some(data) => Block { data },
            None => {
                trace!(capacity = class.capacity, "Allocating new pooled block");
                Block::unpooled(class.capacity)
            }
        }
    }

    /// Return a block to its size class.
    ///
    /// Returns `false` when the block does not belong to any class or the class is
    /// already at its retention limit; the block is dropped in that case.
    pub fn try_release(&self, block: Block) -> bool {
        let metrics = global_metrics();
        let capacity = block.capacity();

        let Some(class) = self
            .inner
            .classes
            .iter()
            .find(|class| class.capacity == capacity)
        else {
            metrics.block_dropped();
            return false;
        };

        match class.free.lock() {
            Ok(mut free) if free.len() < self.inner.retained_per_class => {
                free.push(block.data);
                metrics.block_returned();
                true
            }
            Ok(_) => {
                metrics.block_dropped();
                false
            }
            Err(_) => {
                warn!(capacity, "Block pool lock poisoned; dropping block");
                metrics.block_dropped();
                false
            }
        }
    }

    /// Total idle blocks across every class
    pub fn available(&self) -> usize {
        self.inner
            .classes
            .iter()
            .map(|class| class.free.lock().map(|f| f.len()).unwrap_or(0))
            .sum()
    }

    /// Idle counts for hygiene checks.
    pub fn stats(&self) -> BlockPoolStats {
        let mut stats = BlockPoolStats {
            classes: self.inner.classes.len(),
            ..BlockPoolStats::default()
        };
        for class in &self.inner.classes {
            let idle = class.free.lock().map(|f| f.len()).unwrap_or(0);
            stats.idle_blocks += idle;
            stats.idle_bytes += idle * class.capacity;
        }
        stats
    }

    /// Drop every idle block, returning the number of bytes released.
    pub fn trim(&self) -> usize {
        self.inner
            .classes
            .iter()
            .map(|class| {
                class
                    .free
                    .lock()
                    .map(|mut free| {
                        let bytes = free.len() * class.capacity;
                        free.clear();
                        bytes
                    })
                    .unwrap_or(0)
            })
            .sum()
    }
}

impl BlockPool {
    /// Pool with the default size classes that never keeps a returned block.
    pub fn unretained() -> BlockPool {
        Self::new(DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE, 0)
    }
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new(
            DEFAULT_MIN_BLOCK_SIZE,
            DEFAULT_MAX_BLOCK_SIZE,
            DEFAULT_RETAINED_PER_CLASS,
        )
    }
}

impl std::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPool")
            .field("classes", &self.inner.classes.len())
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_pool_rounds_to_class() {
        let pool = BlockPool::new(256, 4096, 4);
        assert_eq!(pool.rent(1).capacity(), 256);
        assert_eq!(pool.rent(256).capacity(), 256);
        assert_eq!(pool.rent(257).capacity(), 512);
        assert_eq!(pool.rent(4096).capacity(), 4096);
    }

    #[test]
    fn test_block_pool_reuse() {
        let pool = BlockPool::new(64, 1024, 4);
        let mut block = pool.rent(64);
        block.as_mut_slice()[0] = 42;
        assert!(pool.try_release(block));
        assert_eq!(pool.available(), 1);

        let again = pool.rent(10);
        assert_eq!(again.capacity(), 64);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_oversize_block_not_pooled() {
        let pool = BlockPool::new(64, 1024, 4);
        let block = pool.rent(5000);
        assert_eq!(block.capacity(), 5000);
        assert!(!pool.try_release(block));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_retention_limit() {
        let pool = BlockPool::fixed(4, 2);
        let blocks: Vec<Block> = (0..3).map(|_| pool.rent(4)).collect();
        let returned = blocks
            .into_iter()
            .map(|b| pool.try_release(b))
            .filter(|ok| *ok)
            .count();
        assert_eq!(returned, 2);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_fixed_pool_oversize_hint() {
        let pool = BlockPool::fixed(4, 8);
        assert_eq!(pool.rent(3).capacity(), 4);
        assert_eq!(pool.rent(9).capacity(), 9);
        assert_eq!(pool.class_capacity(9), None);
        assert_eq!(pool.class_capacity(2), Some(4));
    }

    #[test]
    fn test_unretained_pool_drops_returned_blocks() {
        let pool = BlockPool::unretained();
        let block = pool.rent(4096);
        assert_eq!(block.capacity(), 4096);
        assert!(!pool.try_release(block));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_trim_releases_idle_blocks() {
        let pool = BlockPool::new(128, 128, 4);
        let a = pool.rent(1);
        let b = pool.rent(1);
        pool.try_release(a);
        pool.try_release(b);
        assert_eq!(
            pool.stats(),
            BlockPoolStats {
                classes: 1,
                idle_blocks: 2,
                idle_bytes: 256
            }
        );
        assert_eq!(pool.trim(), 256);
        assert_eq!(pool.available(), 0);
    }
}
