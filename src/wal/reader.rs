//! Log reader used on open.

use super::record::{Record, RecordType, HEADER_SIZE};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Entries recovered from a log file
#[derive(Debug, Default)]
pub struct Recovered {
    /// Reassembled entries in file order
    pub entries: Vec<Vec<u8>>,
    /// Byte length of the file prefix holding complete, valid entries
    pub valid_len: u64,
}

/// Sequential reader that reassembles fragmented entries
pub struct WALReader {
    reader: BufReader<File>,
    position: u64,
}

impl WALReader {
    /// Open a log file for reading
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { reader: BufReader::new(file), position: 0 })
    }

    /// Read the next complete entry, or `None` at a clean end of file.
    pub fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        let mut assembled = Vec::new();
        let mut in_fragment = false;

        loop {
            let record = match self.read_record()? {
                Some(record) => record,
                None if in_fragment => {
                    return Err(Error::corruption("EOF inside a fragmented entry"));
                }
                None => return Ok(None),
            };

            match (record.record_type, in_fragment) {
                (RecordType::Full, false) => return Ok(Some(record.data)),
                (RecordType::First, false) => {
                    assembled = record.data;
                    in_fragment = true;
                }
                (RecordType::Middle, true) => assembled.extend_from_slice(&record.data),
                (RecordType::Last, true) => {
                    assembled.extend_from_slice(&record.data);
                    return Ok(Some(assembled));
                }
                (record_type, _) => {
                    return Err(Error::corruption(format!(
                        "unexpected {:?} record (inside fragment: {})",
                        record_type, in_fragment
                    )));
                }
            }
        }
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(Error::corruption(format!("torn record header ({} bytes)", read)));
        }

        let length = u16::from_le_bytes([header[4], header[5]]) as usize;
        let mut buffer = vec![0u8; HEADER_SIZE + length];
        buffer[..HEADER_SIZE].copy_from_slice(&header);
        let read = read_full(&mut self.reader, &mut buffer[HEADER_SIZE..])?;
        if read < length {
            return Err(Error::corruption(format!(
                "torn record payload: expected {} bytes, got {}",
                length, read
            )));
        }

        self.position += buffer.len() as u64;
        Record::decode(&buffer).map(Some)
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read every valid entry, stopping at the first corrupt or torn record.
    pub fn recover_all(&mut self) -> Result<Recovered> {
        let mut recovered = Recovered::default();

        loop {
            match self.read_next() {
                Ok(Some(data)) => {
                    recovered.entries.push(data);
                    recovered.valid_len = self.position;
                }
                Ok(None) => break,
                Err(Error::Corruption(msg)) => {
                    log::warn!(
                        "log corruption after byte {}: {}; discarding the tail",
                        recovered.valid_len,
                        msg
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(recovered)
    }
}

/// Like `read_exact`, but reports how many bytes were available at EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
