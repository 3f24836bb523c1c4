//! # Serializer Options
//!
//! Limits applied while walking an object graph: maximum nesting depth, maximum
//! collection length, and an optional cancellation token polled between
//! collection elements.

use tokio_util::sync::CancellationToken;

use crate::error::{FormatterError, Result};
use crate::utils::metrics::global_metrics;

/// Default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Default maximum element count accepted from a collection header (16M)
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 16 * 1024 * 1024;

/// Per-operation limits shared by writers and readers
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    pub max_depth: u32,
    pub max_collection_len: usize,
    pub cancellation: Option<CancellationToken>,
}

impl SerializerOptions {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_collection_len(mut self, max_collection_len: usize) -> Self {
        self.max_collection_len = max_collection_len;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fail with `Cancelled` once the token has fired.
    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => {
                global_metrics().decode_cancelled();
                Err(FormatterError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            cancellation: None,
        }
    }
}

/// Nesting counter carried by a writer or reader
#[derive(Debug, Clone, Copy)]
pub struct DepthGuard {
    depth: u32,
    max: u32,
}

impl DepthGuard {
    pub fn new(max: u32) -> Self {
        Self { depth: 0, max }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Enter one nesting level.
    pub fn enter(&mut self) -> Result<()> {
        let next = self.depth + 1;
        if next > self.max {
            global_metrics().depth_exceeded();
            return Err(FormatterError::DepthExceeded {
                depth: next,
                max: self.max,
            });
        }
        self.depth = next;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
