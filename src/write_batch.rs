//! WriteBatch carries the changes of one committed transaction to the log.
//!
//! Every update transaction accumulates its sets and deletes in a batch. On
//! commit the batch is encoded with bincode and appended to the log as a
//! single entry, so recovery replays a transaction either completely or not
//! at all.
//!
//! # Example
//!
//! ```
//! use tabledb::WriteBatch;
//!
//! let mut batch = WriteBatch::new();
//! batch.set("users:alice", r#"{"updated":1}"#, None);
//! batch.delete("users:bob");
//!
//! let encoded = batch.encode().unwrap();
//! assert_eq!(WriteBatch::decode(&encoded).unwrap(), batch);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Type of write operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Set operation with key, value and optional absolute expiry
    Set {
        /// Key to write
        key: String,
        /// Value to associate with the key
        value: String,
        /// Expiry in milliseconds since the Unix epoch
        expires_at: Option<u64>,
    },
    /// Delete operation with key
    Delete {
        /// Key to delete
        key: String,
    },
}

impl WriteOp {
    /// The key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// An ordered list of write operations applied atomically.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    operations: Vec<WriteOp>,
    approximate_size: usize,
}

impl WriteBatch {
    /// Creates a new empty WriteBatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Set operation to the batch.
    pub fn set(&mut self, key: &str, value: &str, expires_at: Option<u64>) {
        self.approximate_size += key.len() + value.len() + 16;
        self.operations.push(WriteOp::Set {
            key: key.to_string(),
            value: value.to_string(),
            expires_at,
        });
    }

    /// Adds a Delete operation to the batch.
    pub fn delete(&mut self, key: &str) {
        self.approximate_size += key.len() + 4;
        self.operations.push(WriteOp::Delete { key: key.to_string() });
    }

    /// Clears all operations from the batch.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.approximate_size = 0;
    }

    /// Returns the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the batch contains no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the approximate size of the batch in bytes.
    pub fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    /// Iterates over the operations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.operations.iter()
    }

    /// Encodes the batch for the log.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a batch read back from the log.
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| Error::corruption(format!("undecodable write batch: {}", e)))
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}
