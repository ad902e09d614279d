//! Append-only log that makes the store durable.
//!
//! Every committed write transaction is appended as one entry holding a
//! bincode-encoded [`WriteBatch`]. Opening a store replays the entries in
//! order to rebuild the in-memory keyspace.
//!
//! ## Architecture
//!
//! - **Record Format**: each entry is framed with a CRC32 checksum
//! - **Fragmentation**: entries larger than one record are split
//! - **Recovery**: a torn or corrupt tail is cut off at the last good entry
//! - **Shrink**: the whole file can be swapped for a compact rewrite
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tabledb::wal::WAL;
//! use tabledb::{SyncPolicy, WriteBatch};
//!
//! # fn main() -> Result<(), tabledb::Error> {
//! let (mut wal, replayed) = WAL::open("data.db")?;
//! println!("replayed {} batches", replayed.len());
//!
//! let mut batch = WriteBatch::new();
//! batch.set("users:alice", "{}", None);
//! wal.append_batch(&batch, SyncPolicy::Always)?;
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{Recovered, WALReader};
pub use record::{Record, RecordType};
pub use writer::WALWriter;

use crate::config::SyncPolicy;
use crate::error::Result;
use crate::write_batch::WriteBatch;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

/// Minimum spacing between fsyncs under [`SyncPolicy::EverySecond`].
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// The store's log file
pub struct WAL {
    writer: WALWriter,
    last_sync: Instant,
}

impl WAL {
    /// Open or create the log, returning the batches it already holds.
    ///
    /// A torn or corrupt tail is truncated so new appends follow the last
    /// complete entry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<WriteBatch>)> {
        let path = path.as_ref();

        let mut batches = Vec::new();
        if path.exists() {
            let recovered = WALReader::new(path)?.recover_all()?;
            let file_len = fs::metadata(path)?.len();
            if recovered.valid_len < file_len {
                log::warn!(
                    "truncating {:?} from {} to {} bytes",
                    path,
                    file_len,
                    recovered.valid_len
                );
                OpenOptions::new().write(true).open(path)?.set_len(recovered.valid_len)?;
            }
            for entry in &recovered.entries {
                batches.push(WriteBatch::decode(entry)?);
            }
        }

        let writer = WALWriter::new(path)?;
        Ok((Self { writer, last_sync: Instant::now() }, batches))
    }

    /// Append one committed batch and sync according to `policy`.
    pub fn append_batch(&mut self, batch: &WriteBatch, policy: SyncPolicy) -> Result<()> {
        self.writer.append(&batch.encode()?)?;

        match policy {
            SyncPolicy::Always => self.sync(),
            SyncPolicy::EverySecond if self.last_sync.elapsed() >= SYNC_INTERVAL => self.sync(),
            SyncPolicy::EverySecond | SyncPolicy::Never => self.writer.flush(),
        }
    }

    /// Flush and fsync the log
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Current file size
    pub fn size(&self) -> u64 {
        self.writer.file_size()
    }

    /// Path to the log file
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Atomically replace the log with a fully written file at `replacement`.
    pub fn replace_with(&mut self, replacement: &Path) -> Result<()> {
        self.writer.flush()?;
        let path = self.path().to_path_buf();
        fs::rename(replacement, &path)?;
        self.writer = WALWriter::new(&path)?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Sync and close the log
    pub fn close(self) -> Result<()> {
        self.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_batch::WriteOp;
    use std::io::Write;
    use tempfile::TempDir;

    fn batch(key: &str, value: &str) -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.set(key, value, None);
        batch
    }

    #[test]
    fn test_append_and_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        {
            let (mut wal, replayed) = WAL::open(&path).unwrap();
            assert!(replayed.is_empty());
            wal.append_batch(&batch("a", "1"), SyncPolicy::Always).unwrap();
            wal.append_batch(&batch("b", "2"), SyncPolicy::Never).unwrap();
            wal.close().unwrap();
        }

        let (_wal, replayed) = WAL::open(&path).unwrap();
        let keys: Vec<String> =
            replayed.iter().flat_map(|b| b.iter().map(|op| op.key().to_string())).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_open_truncates_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        let good_len = {
            let (mut wal, _) = WAL::open(&path).unwrap();
            wal.append_batch(&batch("a", "1"), SyncPolicy::Always).unwrap();
            wal.size()
        };
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xDE, 0xAD]).unwrap();
        }

        let (mut wal, replayed) = WAL::open(&path).unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(wal.size(), good_len);

        // appends after recovery are readable again
        wal.append_batch(&batch("b", "2"), SyncPolicy::Always).unwrap();
        drop(wal);
        let (_wal, replayed) = WAL::open(&path).unwrap();
        assert_eq!(replayed.len(), 2);
    }

    #[test]
    fn test_replace_with() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        let replacement = dir.path().join("store.db.shrink");

        let (mut wal, _) = WAL::open(&path).unwrap();
        for i in 0..10 {
            wal.append_batch(&batch("k", &i.to_string()), SyncPolicy::Never).unwrap();
        }
        let before = wal.size();

        {
            let mut writer = WALWriter::new(&replacement).unwrap();
            writer.append(&batch("k", "9").encode().unwrap()).unwrap();
            writer.close().unwrap();
        }
        wal.replace_with(&replacement).unwrap();
        assert!(wal.size() < before);
        assert!(!replacement.exists());
        drop(wal);

        let (_wal, replayed) = WAL::open(&path).unwrap();
        let ops: Vec<WriteOp> = replayed.into_iter().flatten().collect();
        assert_eq!(
            ops,
            vec![WriteOp::Set { key: "k".into(), value: "9".into(), expires_at: None }]
        );
    }
}
