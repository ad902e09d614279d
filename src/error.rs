//! Error types for tabledb.

use std::io;
use thiserror::Error;

/// The result type used throughout tabledb.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for store and table operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption was detected in the log file.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The requested key does not exist, has expired, or an index yielded nothing.
    #[error("Not found")]
    NotFound,

    /// A record could not be encoded to JSON.
    #[error("Encode failure: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored value could not be decoded from JSON.
    #[error("Decode failure: {0}")]
    Decode(#[source] serde_json::Error),

    /// A log batch could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store has been closed.
    #[error("Database closed")]
    DatabaseClosed,

    /// A write was attempted inside a read-only transaction.
    #[error("Transaction is not writable")]
    TxNotWritable,

    /// An index with the same name but a different definition exists.
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// The named index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
