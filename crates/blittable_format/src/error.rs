//! Error types for the format crate.

use blittable_memory::PoolError;
use thiserror::Error;

/// Result type for document operations.
pub type BlittableResult<T> = Result<T, BlittableError>;

/// Errors that can occur while writing or reading a blittable document.
///
/// A lookup miss is not an error: `try_get` accessors return `Ok(None)`.
/// Only the required accessors turn a miss into
/// [`BlittableError::MemberNotFound`] or [`BlittableError::IndexOutOfRange`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlittableError {
    /// Pool bookkeeping failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The token stream ended where more input was required.
    #[error("unexpected end of token stream, expected {expected}")]
    UnexpectedEof {
        /// What the writer was waiting for.
        expected: String,
    },

    /// The token stream produced a token that does not fit the current
    /// position.
    #[error("unexpected token {found}, expected {expected}")]
    UnexpectedToken {
        /// What the writer was waiting for.
        expected: String,
        /// The token that arrived instead.
        found: String,
    },

    /// A variable-length integer has its continuation bit set beyond the
    /// maximum width.
    #[error("malformed variable-length integer at position {position}")]
    MalformedVarint {
        /// Position of the first byte of the integer.
        position: usize,
    },

    /// An LZ4 payload did not decompress to the recorded length.
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressedSizeMismatch {
        /// Recorded uncompressed length.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },

    /// The document bytes are structurally invalid.
    #[error("invalid document format: {message}")]
    InvalidFormat {
        /// Description of the structural error.
        message: String,
    },

    /// A stored string is not valid UTF-8.
    #[error("invalid UTF-8 string at position {position}")]
    InvalidUtf8 {
        /// Position of the string payload.
        position: usize,
    },

    /// The value kind cannot be encoded.
    #[error("not implemented: {kind} values are not supported")]
    Unsupported {
        /// Name of the unsupported kind.
        kind: String,
    },

    /// A required property is missing.
    #[error("member not found: {name}")]
    MemberNotFound {
        /// The property name that was looked up.
        name: String,
    },

    /// A required array index is out of range.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },

    /// The operation is not valid in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the misuse.
        message: String,
    },
}

impl BlittableError {
    /// Create an unexpected end of stream error.
    pub fn unexpected_eof(expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            expected: expected.into(),
        }
    }

    /// Create an unexpected token error.
    pub fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an unsupported value error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::Unsupported { kind: kind.into() }
    }

    /// Create a member not found error.
    pub fn member_not_found(name: impl Into<String>) -> Self {
        Self::MemberNotFound { name: name.into() }
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by a malformed token stream or
    /// malformed document bytes.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::UnexpectedToken { .. }
                | Self::MalformedVarint { .. }
                | Self::DecompressedSizeMismatch { .. }
                | Self::InvalidFormat { .. }
                | Self::InvalidUtf8 { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_are_classified() {
        assert!(BlittableError::unexpected_eof("value").is_format_error());
        assert!(BlittableError::MalformedVarint { position: 3 }.is_format_error());
        assert!(!BlittableError::unsupported("bytes").is_format_error());
        assert!(!BlittableError::member_not_found("Name").is_format_error());
    }

    #[test]
    fn pool_errors_convert() {
        let err: BlittableError = PoolError::Disposed.into();
        assert_eq!(err, BlittableError::Pool(PoolError::Disposed));
        assert_eq!(err.to_string(), "memory pool is disposed");
    }

    #[test]
    fn messages_name_the_problem() {
        let err = BlittableError::unexpected_token("property name", "Integer");
        assert_eq!(
            err.to_string(),
            "unexpected token Integer, expected property name"
        );
        let err = BlittableError::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(err.to_string(), "index 5 out of range for array of length 3");
    }
}
