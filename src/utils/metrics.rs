//! Observability and Metrics
//!
//! This module provides metrics collection for pool hygiene and formatter
//! throughput.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Global metrics collector for buffer and formatter operations
#[derive(Debug)]
pub struct Metrics {
    /// Blocks handed out by any block pool
    pub blocks_rented: AtomicU64,
    /// Blocks accepted back into a pool
    pub blocks_returned: AtomicU64,
    /// Blocks a pool refused (unpooled, class full, or poisoned lock)
    pub blocks_dropped: AtomicU64,
    /// Sequence buffers rented from a buffer pool
    pub buffers_rented: AtomicU64,
    /// Sequence buffers frozen for reading
    pub buffers_frozen: AtomicU64,
    /// Segment chains whose storage went back to the pools
    pub buffers_released: AtomicU64,
    /// Readers rented from a reader pool
    pub readers_rented: AtomicU64,
    /// Reader shells returned to their pool
    pub readers_returned: AtomicU64,
    /// Formatters compiled by a resolver
    pub formatters_compiled: AtomicU64,
    /// Values serialized through the facade
    pub values_serialized: AtomicU64,
    /// Values deserialized through the facade
    pub values_deserialized: AtomicU64,
    /// Total bytes written by the facade
    pub bytes_serialized: AtomicU64,
    /// Total bytes consumed by the facade
    pub bytes_deserialized: AtomicU64,
    /// Malformed or truncated input
    pub decode_faults: AtomicU64,
    /// Nesting beyond the configured maximum
    pub depth_exceeded: AtomicU64,
    /// Decodes aborted through their cancellation token
    pub decodes_cancelled: AtomicU64,
    /// Facade decodes that failed for any reason other than malformed input
    pub decodes_failed: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            blocks_rented: AtomicU64::new(0),
            blocks_returned: AtomicU64::new(0),
            blocks_dropped: AtomicU64::new(0),
            buffers_rented: AtomicU64::new(0),
            buffers_frozen: AtomicU64::new(0),
            buffers_released: AtomicU64::new(0),
            readers_rented: AtomicU64::new(0),
            readers_returned: AtomicU64::new(0),
            formatters_compiled: AtomicU64::new(0),
            values_serialized: AtomicU64::new(0),
            values_deserialized: AtomicU64::new(0),
            bytes_serialized: AtomicU64::new(0),
            bytes_deserialized: AtomicU64::new(0),
            decode_faults: AtomicU64::new(0),
            depth_exceeded: AtomicU64::new(0),
            decodes_cancelled: AtomicU64::new(0),
            decodes_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn block_rented(&self) {
        self.blocks_rented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn block_returned(&self) {
        self.blocks_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn block_dropped(&self) {
        self.blocks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_rented(&self) {
        self.buffers_rented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_frozen(&self) {
        self.buffers_frozen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_released(&self) {
        self.buffers_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reader_rented(&self) {
        self.readers_rented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reader_returned(&self) {
        self.readers_returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a freshly compiled formatter
    pub fn formatter_compiled(&self) {
        self.formatters_compiled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value written by the facade
    pub fn value_serialized(&self, byte_count: u64) {
        self.values_serialized.fetch_add(1, Ordering::Relaxed);
        self.bytes_serialized.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a value read by the facade
    pub fn value_deserialized(&self, byte_count: u64) {
        self.values_deserialized.fetch_add(1, Ordering::Relaxed);
        self.bytes_deserialized.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn decode_fault(&self) {
        self.decode_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn depth_exceeded(&self) {
        self.depth_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_cancelled(&self) {
        self.decodes_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decodes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_rented: self.blocks_rented.load(Ordering::Relaxed),
            blocks_returned: self.blocks_returned.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            buffers_rented: self.buffers_rented.load(Ordering::Relaxed),
            buffers_frozen: self.buffers_frozen.load(Ordering::Relaxed),
            buffers_released: self.buffers_released.load(Ordering::Relaxed),
            readers_rented: self.readers_rented.load(Ordering::Relaxed),
            readers_returned: self.readers_returned.load(Ordering::Relaxed),
            formatters_compiled: self.formatters_compiled.load(Ordering::Relaxed),
            values_serialized: self.values_serialized.load(Ordering::Relaxed),
            values_deserialized: self.values_deserialized.load(Ordering::Relaxed),
            bytes_serialized: self.bytes_serialized.load(Ordering::Relaxed),
            bytes_deserialized: self.bytes_deserialized.load(Ordering::Relaxed),
            decode_faults: self.decode_faults.load(Ordering::Relaxed),
            depth_exceeded: self.depth_exceeded.load(Ordering::Relaxed),
            decodes_cancelled: self.decodes_cancelled.load(Ordering::Relaxed),
            decodes_failed: self.decodes_failed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            blocks_rented = snapshot.blocks_rented,
            blocks_returned = snapshot.blocks_returned,
            blocks_dropped = snapshot.blocks_dropped,
            buffers_rented = snapshot.buffers_rented,
            buffers_frozen = snapshot.buffers_frozen,
            buffers_released = snapshot.buffers_released,
            readers_rented = snapshot.readers_rented,
            readers_returned = snapshot.readers_returned,
            formatters_compiled = snapshot.formatters_compiled,
            values_serialized = snapshot.values_serialized,
            values_deserialized = snapshot.values_deserialized,
            bytes_serialized = snapshot.bytes_serialized,
            bytes_deserialized = snapshot.bytes_deserialized,
            decode_faults = snapshot.decode_faults,
            depth_exceeded = snapshot.depth_exceeded,
            decodes_cancelled = snapshot.decodes_cancelled,
            decodes_failed = snapshot.decodes_failed,
            uptime_seconds = snapshot.uptime_seconds,
            "Formatter metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub blocks_rented: u64,
    pub blocks_returned: u64,
    pub blocks_dropped: u64,
    pub buffers_rented: u64,
    pub buffers_frozen: u64,
    pub buffers_released: u64,
    pub readers_rented: u64,
    pub readers_returned: u64,
    pub formatters_compiled: u64,
    pub values_serialized: u64,
    pub values_deserialized: u64,
    pub bytes_serialized: u64,
    pub bytes_deserialized: u64,
    pub decode_faults: u64,
    pub depth_exceeded: u64,
    pub decodes_cancelled: u64,
    pub decodes_failed: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Initialize metrics collection (call once at startup)
pub fn init_metrics() {
    // Force initialization
    let _ = global_metrics();
    info!("Metrics collection initialized");
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.block_rented();
        metrics.block_rented();
        metrics.block_returned();
        metrics.value_serialized(12);
        metrics.value_serialized(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.blocks_rented, 2);
        assert_eq!(snapshot.blocks_returned, 1);
        assert_eq!(snapshot.values_serialized, 2);
        assert_eq!(snapshot.bytes_serialized, 15);
        assert_eq!(snapshot.decode_faults, 0);
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let before = global_metrics().snapshot().formatters_compiled;
        global_metrics().formatter_compiled();
        assert!(global_metrics().snapshot().formatters_compiled > before);
    }
}
