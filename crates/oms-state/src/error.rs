//! Error types for the OMS state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Opening the database, beginning/committing a transaction, or
    /// opening a table failed.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    /// A row could not be encoded to or decoded from JSON.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("package record {0} not found")]
    RecordNotFound(u64),

    #[error("package file {0} not found")]
    FileNotFound(u64),
}
