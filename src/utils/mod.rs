//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe counters for pool hygiene and formatter throughput

pub mod logging;
pub mod metrics;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot, Timer};
