//! # Reader Pool
//!
//! Pooled [`SequenceReader`] shells. A rented reader holds one freeze of its
//! sequence; disposing it gives the freeze up, and dropping it returns the shell.
//!
//! ## Usage
//! ```rust
//! use wire_formatter::buffer::{BlockPool, ReaderPool, SequenceBuffer};
//!
//! let mut buffer = SequenceBuffer::new(BlockPool::default());
//! buffer.write(&[1, 2, 3]).unwrap();
//! let frozen = buffer.freeze();
//!
//! let pool = ReaderPool::new(4);
//! let mut reader = pool.rent(frozen);
//! assert_eq!(reader.reader().unwrap().remaining(), 3);
//! reader.dispose().unwrap();
//! assert!(reader.reader().is_err());
//! ```

use std::sync::{Arc, Mutex};

use crate::buffer::reader::SequenceReader;
use crate::buffer::sequence::FrozenSequence;
use crate::error::{FormatterError, Result};
use crate::options::SerializerOptions;
use crate::utils::metrics::global_metrics;

/// Default number of idle reader shells kept by a pool
pub const DEFAULT_RETAINED_READERS: usize = 64;

type Shells = Arc<Mutex<Vec<Box<SequenceReader>>>>;

/// Thread-safe pool of reader shells
#[derive(Clone)]
pub struct ReaderPool {
    shells: Shells,
    max_retained: usize,
}

impl ReaderPool {
    pub fn new(max_retained: usize) -> Self {
        Self {
            shells: Arc::new(Mutex::new(Vec::new())),
            max_retained,
        }
    }

    pub fn rent(&self, source: FrozenSequence) -> PooledSequenceReader {
        self.rent_with_options(source, SerializerOptions::default())
    }

    pub fn rent_with_options(
        &self,
        source: FrozenSequence,
        options: SerializerOptions,
    ) -> PooledSequenceReader {
        global_metrics().reader_rented();
        let shell = self.shells.lock().ok().and_then(|mut shells| shells.pop());
        let reader = match shell {
            Some(mut reader) => {
                reader.attach(source, options);
                reader
            }
            None => Box::new(SequenceReader::with_options(source, options)),
        };

        PooledSequenceReader {
            reader: Some(reader),
            shells: self.shells.clone(),
            max_retained: self.max_retained,
        }
    }

    /// Idle reader shells
    pub fn available(&self) -> usize {
        self.shells.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for ReaderPool {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_READERS)
    }
}

impl std::fmt::Debug for ReaderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPool")
            .field("available", &self.available())
            .field("max_retained", &self.max_retained)
            .finish()
    }
}

/// A rented reader that returns its shell to the pool on drop
pub struct PooledSequenceReader {
    reader: Option<Box<SequenceReader>>,
    shells: Shells,
    max_retained: usize,
}

impl PooledSequenceReader {
    /// The live reader, or `Disposed` after [`dispose`](Self::dispose).
    pub fn reader(&mut self) -> Result<&mut SequenceReader> {
        match self.reader.as_deref_mut() {
            Some(reader) if !reader.is_disposed() => Ok(reader),
            _ => Err(FormatterError::Disposed),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.reader.as_ref().map_or(true, |r| r.is_disposed())
    }

    /// Release the freeze on the sequence. Returns whether it was the last holder.
    pub fn dispose(&mut self) -> Result<bool> {
        self.reader()?.dispose()
    }
}

impl Drop for PooledSequenceReader {
    fn drop(&mut self) {
        let Some(mut reader) = self.reader.take() else {
            return;
        };
        if !reader.is_disposed() {
            let _ = reader.dispose();
        }
        global_metrics().reader_returned();
        if let Ok(mut shells) = self.shells.lock() {
            if shells.len() < self.max_retained {
                shells.push(reader);
            }
        }
    }
}

impl std::fmt::Debug for PooledSequenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSequenceReader")
            .field("reader", &self.reader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::block_pool::BlockPool;
    use crate::buffer::sequence::SequenceBuffer;

    fn frozen(bytes: &[u8]) -> FrozenSequence {
        let mut buffer = SequenceBuffer::new(BlockPool::fixed(4, 8));
        buffer.write(bytes).unwrap();
        buffer.freeze()
    }

    #[test]
    fn test_shell_is_recycled() {
        let pool = ReaderPool::new(2);
        {
            let mut first = pool.rent(frozen(b"abc"));
            assert_eq!(first.reader().unwrap().read_u8().unwrap(), b'a');
        }
        assert_eq!(pool.available(), 1);

        let mut second = pool.rent(frozen(b"xyz"));
        assert_eq!(pool.available(), 0);
        let reader = second.reader().unwrap();
        assert_eq!(reader.consumed(), 0);
        assert_eq!(reader.read_u8().unwrap(), b'x');
    }

    #[test]
    fn test_disposed_reader_reports_disposed() {
        let pool = ReaderPool::new(2);
        let mut reader = pool.rent(frozen(b"abc"));
        assert!(reader.dispose().unwrap());
        assert!(matches!(reader.reader(), Err(FormatterError::Disposed)));
        assert!(matches!(reader.dispose(), Err(FormatterError::Disposed)));
    }

    #[test]
    fn test_two_readers_share_one_freeze() {
        let pool = ReaderPool::new(2);
        let sequence = frozen(b"shared");
        let mut a = pool.rent(sequence.clone());
        let mut b = pool.rent(sequence);
        assert!(!a.dispose().unwrap());
        assert!(b.dispose().unwrap());
    }
}
