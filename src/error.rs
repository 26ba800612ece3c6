//! Error types for the CMap library.
//!
//! This module defines all error types that can occur while tokenizing,
//! parsing, building and loading CMaps.

use crate::object::ObjectRef;

/// Result type alias for CMap library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during CMap processing.
///
/// A lookup miss is never reported through this type: `CMap::resolve_code`
/// returns `None` for unmapped codes.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "SyntaxError" mirrors the CMap terminology
pub enum Error {
    /// Allocation failure while growing the range or overflow table
    #[error("Out of memory: {0}")]
    OutOfMemory(&'static str),

    /// Unexpected token or malformed input
    #[error("Syntax error at byte {offset}: {reason}")]
    SyntaxError {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// The codespace registry is full
    #[error("Too many codespace ranges (max: {0})")]
    TooManyCodespaces(usize),

    /// A mapping whose low code lies above its high code
    #[error("Invalid code range: <{low:X}> <{high:X}>")]
    InvalidRange {
        /// First code of the range
        low: u32,
        /// Last code of the range
        high: u32,
    },

    /// Named system CMap could not be located
    #[error("CMap resource not found: {0}")]
    MissingResource(String),

    /// A `usecmap` chain refers back to a CMap that is still loading
    #[error("Cyclic usecmap chain through '{0}'")]
    CyclicUseCmap(String),

    /// Circular reference between embedded CMap streams
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Referenced object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::SyntaxError`].
    pub(crate) fn syntax(offset: usize, reason: impl Into<String>) -> Self {
        Error::SyntaxError {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error() {
        let err = Error::syntax(1234, "expected string or endbfchar");
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("endbfchar"));
    }

    #[test]
    fn test_too_many_codespaces_error() {
        let err = Error::TooManyCodespaces(9);
        let msg = format!("{}", err);
        assert!(msg.contains("codespace"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_invalid_range_error() {
        let err = Error::InvalidRange { low: 0x20, high: 0x10 };
        assert_eq!(format!("{}", err), "Invalid code range: <20> <10>");
    }

    #[test]
    fn test_cyclic_use_cmap_error() {
        let err = Error::CyclicUseCmap("UniJIS-UCS2-H".to_string());
        assert!(format!("{}", err).contains("UniJIS-UCS2-H"));
    }

    #[test]
    fn test_circular_reference_error() {
        let err = Error::CircularReference(ObjectRef::new(12, 0));
        assert!(format!("{}", err).contains("12 0 R"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        let msg = format!("{}", err);
        assert!(msg.contains("10 0 R"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
