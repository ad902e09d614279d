//! Log writer.

use super::record::{Record, RecordType, MAX_RECORD_SIZE};
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends framed entries to the log file
pub struct WALWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    file_size: u64,
}

impl WALWriter {
    /// Open the file in append mode, creating it if needed.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let file_size = file.metadata()?.len();

        Ok(Self { path, writer: BufWriter::new(file), file_size })
    }

    /// Append one entry, fragmenting it if it exceeds a single record.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let total = data.len();
        let mut offset = 0;
        while offset < total {
            let len = (total - offset).min(MAX_RECORD_SIZE);
            let record_type = RecordType::for_fragment(offset, len, total);
            let encoded = Record::new(record_type, data[offset..offset + len].to_vec()).encode();

            self.writer.write_all(&encoded)?;
            self.file_size += encoded.len() as u64;
            offset += len;
        }
        Ok(())
    }

    /// Hand buffered bytes to the operating system.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and fsync.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Current file size, including buffered bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the writer, syncing all data
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}

impl Drop for WALWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
