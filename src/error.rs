//! # Error Types
//!
//! Error handling for the buffer and formatter engine.
//!
//! Every failure is surfaced synchronously at the failing call. The engine performs
//! no local recovery or retry; callers (networking, persistence) translate these
//! variants into their own error types.
//!
//! ## Error Categories
//! - **Decode faults**: truncated or malformed input, unexpected headers
//! - **Depth exceeded**: nesting beyond the configured maximum
//! - **Missing constructor**: a type that cannot be built during deserialization
//! - **Unresolved formatter**: no primitive, container, or object formatter exists
//! - **Lifecycle errors**: use of a disposed or frozen buffer, out-of-range cursors
//! - **Cancellation**: a decode aborted through its cancellation token
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use wire_formatter::error::{FormatterError, Result};
//! use tracing::error;
//!
//! fn decode(bytes: &[u8]) -> Result<u32> {
//!     wire_formatter::deserialize::<u32>(bytes)
//! }
//!
//! match decode(&[0xCE, 0x00]) {
//!     Ok(value) => println!("decoded {value}"),
//!     Err(FormatterError::Decode { offset, .. }) => error!(offset, "truncated input"),
//!     Err(e) => error!(error = %e, "decode failed"),
//! }
//! ```

use std::borrow::Cow;
use std::io;
use thiserror::Error;

/// Static decode-fault reasons so error paths stay allocation-free.
pub mod constants {
    pub const ERR_UNEXPECTED_END: &str = "Unexpected end of input";
    pub const ERR_UNEXPECTED_NIL: &str = "Unexpected nil marker for a non-optional value";
    pub const ERR_UNEXPECTED_CODE: &str = "Unexpected type code";
    pub const ERR_INVALID_UTF8: &str = "String payload is not valid UTF-8";
    pub const ERR_INVALID_CHAR: &str = "Value is not a valid unicode scalar";
    pub const ERR_INVALID_BOOL: &str = "Invalid boolean code";
    pub const ERR_INVALID_DISCRIMINANT: &str = "Unknown enum discriminant";
    pub const ERR_LENGTH_MISMATCH: &str = "Collection length does not match the fixed arity";
    pub const ERR_COLLECTION_TOO_LONG: &str = "Collection header exceeds the configured maximum";
    pub const ERR_DUPLICATE_KEY: &str = "Duplicate key in map or set payload";
    pub const ERR_UNKNOWN_OBJECT_TYPE: &str = "Unknown polymorphic type name";
    pub const ERR_INTEGER_OVERFLOW: &str = "Integer does not fit the target type";
    pub const ERR_TRAILING_BYTES: &str = "Input continues past the end of the value";
}

/// FormatterError is the primary error type for all buffer and formatter operations
#[derive(Error, Debug)]
pub enum FormatterError {
    /// Truncated or malformed input, or an unexpected header.
    #[error("Decode fault at offset {offset}: {reason}")]
    Decode {
        offset: u64,
        reason: Cow<'static, str>,
    },

    /// Nesting deeper than the configured maximum.
    #[error("Nesting depth {depth} exceeds the configured maximum of {max}")]
    DepthExceeded { depth: u32, max: u32 },

    /// The type has no constructor usable for deserialization.
    #[error("Type `{0}` has no constructor usable for deserialization")]
    MissingConstructor(&'static str),

    /// No formatter could be produced for the type.
    #[error("No formatter could be resolved for `{0}`")]
    UnresolvedFormatter(Cow<'static, str>),

    #[error("Operation on a released buffer or reader")]
    Disposed,

    #[error("Buffer is frozen and no longer accepts writes")]
    Frozen,

    #[error("Requested {requested} bytes but only {available} are available")]
    OutOfRange { requested: usize, available: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FormatterError {
    /// Build a decode fault with a static reason.
    pub fn decode(offset: u64, reason: &'static str) -> Self {
        FormatterError::Decode {
            offset,
            reason: Cow::Borrowed(reason),
        }
    }

    /// Build a decode fault whose reason is computed at the failure site.
    pub fn decode_owned(offset: u64, reason: String) -> Self {
        FormatterError::Decode {
            offset,
            reason: Cow::Owned(reason),
        }
    }

    /// Build an unresolved-formatter error naming `T`.
    pub fn unresolved<T: ?Sized>() -> Self {
        FormatterError::UnresolvedFormatter(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Whether the error describes malformed input rather than a programming or
    /// configuration problem.
    pub fn is_decode_fault(&self) -> bool {
        matches!(
            self,
            FormatterError::Decode { .. } | FormatterError::DepthExceeded { .. }
        )
    }
}

/// Type alias for Results using FormatterError
pub type Result<T> = std::result::Result<T, FormatterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fault_message() {
        let err = FormatterError::decode(7, constants::ERR_UNEXPECTED_END);
        assert_eq!(
            err.to_string(),
            "Decode fault at offset 7: Unexpected end of input"
        );
        assert!(err.is_decode_fault());
    }

    #[test]
    fn test_unresolved_names_type() {
        let err = FormatterError::unresolved::<std::fs::File>();
        assert!(err.to_string().contains("std::fs::File"));
        assert!(!err.is_decode_fault());
    }
}
