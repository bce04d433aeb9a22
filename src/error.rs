//! Error types for lexstore.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is [`LexstoreError`]. Structural errors (duplicate ids, missing documents,
//! malformed filters, bad configuration) are never swallowed; persistence
//! failures are reported as [`LexstoreError::IoFailure`] and may be retried by
//! the caller.

use std::io;

/// Main error type for lexstore operations.
#[derive(Debug, thiserror::Error)]
pub enum LexstoreError {
    /// A document with this id is already present.
    #[error("duplicate document id: {0}")]
    DuplicateId(String),

    /// No document with this id is present.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The filter predicate is malformed (unknown operator, operand type mismatch).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A known configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The document itself is malformed (empty id, nested list metadata, ...).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The snapshot on disk was written by an incompatible engine version.
    #[error("incompatible index version: found {found}, supported {supported}")]
    IncompatibleIndexVersion { found: String, supported: String },

    /// Reading or writing the persisted index failed.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// Snapshot encoding, decoding or integrity check failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A flush was interrupted through its cancellation flag.
    #[error("flush cancelled before completion")]
    FlushCancelled,

    /// A strict batch stopped at `position` and was rolled back.
    #[error("batch aborted at item {position}: {source}")]
    BatchAborted {
        position: usize,
        #[source]
        source: Box<LexstoreError>,
    },
}

impl LexstoreError {
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        LexstoreError::DuplicateId(id.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        LexstoreError::NotFound(id.into())
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        LexstoreError::InvalidFilter(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        LexstoreError::InvalidConfiguration(msg.into())
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        LexstoreError::InvalidDocument(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        LexstoreError::Serialization(msg.into())
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only persistence failures are transient; every structural error will
    /// fail again with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LexstoreError::IoFailure(_) | LexstoreError::FlushCancelled
        )
    }
}

impl From<serde_json::Error> for LexstoreError {
    fn from(err: serde_json::Error) -> Self {
        LexstoreError::Serialization(err.to_string())
    }
}

/// Result type alias using [`LexstoreError`].
pub type Result<T> = std::result::Result<T, LexstoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LexstoreError::duplicate_id("doc1");
        assert!(err.to_string().contains("doc1"));

        let err = LexstoreError::IncompatibleIndexVersion {
            found: "7".to_string(),
            supported: "1".to_string(),
        };
        assert!(err.to_string().contains("found 7"));
    }

    #[test]
    fn test_io_error_is_retryable() {
        let err: LexstoreError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, LexstoreError::IoFailure(_)));
        assert!(err.is_retryable());
        assert!(!LexstoreError::not_found("x").is_retryable());
    }

    #[test]
    fn test_batch_aborted_keeps_source() {
        let err = LexstoreError::BatchAborted {
            position: 2,
            source: Box::new(LexstoreError::duplicate_id("doc2")),
        };
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("duplicate document id: doc2"));
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: LexstoreError = json_err.into();
        assert!(matches!(err, LexstoreError::Serialization(_)));
    }
}
