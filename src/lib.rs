//! # wire-formatter
//!
//! Segmented, pooled byte buffers and a compile-once formatter engine for a compact,
//! self-describing binary wire format.
//!
//! ## Layers
//! - [`buffer`]: block pool, segment chains, sequence buffers with freeze/release,
//!   byte buffers and sequence readers (plain and pooled)
//! - [`format`]: the [`Formatter`] contract, wire codes, primitive, string,
//!   collection, dictionary and runtime-typed formatters
//! - [`resolver`]: type to formatter cache, registration, derived and shaped types
//! - [`serializer`]: the [`WireSerializer`] facade and crate-level functions
//! - [`config`], [`error`], [`options`], [`utils`]: configuration, errors, limits,
//!   logging and metrics
//!
//! ## Quick start
//! ```rust
//! use wire_formatter::Formattable;
//!
//! #[derive(Debug, PartialEq, Formattable)]
//! struct Greeting {
//!     id: i32,
//!     text: String,
//!     tags: Option<Vec<String>>,
//! }
//!
//! let value = Greeting { id: 123, text: "测试".into(), tags: None };
//! let bytes = wire_formatter::serialize_to_vec(&value).unwrap();
//! assert_eq!(&bytes[..5], &[0xD2, 0, 0, 0, 123]);
//! assert_eq!(wire_formatter::get_length(&value).unwrap(), bytes.len() as u64);
//!
//! let decoded: Greeting = wire_formatter::deserialize(&bytes).unwrap();
//! assert_eq!(decoded, value);
//! ```

// Lets the derive's `::wire_formatter::` paths resolve inside this crate.
extern crate self as wire_formatter;

pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod options;
pub mod resolver;
pub mod serializer;
pub mod utils;

pub use buffer::{
    BlockPool, ByteBuffer, FrozenSequence, PooledSequenceReader, ReaderPool, SequenceBuffer,
    SequenceBufferPool, SequenceReader, SequenceView,
};
pub use config::FormatterConfig;
pub use error::{FormatterError, Result};
pub use format::{AnyObject, Formattable, Formatter, FormatterKind};
pub use options::SerializerOptions;
pub use resolver::{ObjectShape, Resolver};
pub use serializer::{
    default_serializer, deserialize, get_length, serialize, serialize_to_vec, WireSerializer,
};

/// `#[derive(Formattable)]`: member-wise formatter for structs, discriminant
/// formatter for fieldless enums. Fields marked `#[wire(skip)]` are not written
/// and are filled with `Default::default()` when reading.
pub use wire_formatter_derive::Formattable;
