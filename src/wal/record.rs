//! Physical record framing for the log file.
//!
//! Each record consists of:
//! - Checksum (4 bytes): CRC32 of type and payload
//! - Length (2 bytes): length of the payload
//! - Type (1 byte): Full, First, Middle or Last
//! - Payload (variable)
//!
//! Batches larger than [`MAX_RECORD_SIZE`] are split into First/Middle/Last
//! fragments by the writer and reassembled by the reader.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;

/// Maximum size of a single record's payload
pub const MAX_RECORD_SIZE: usize = 32 * 1024;

/// Size of the record header (checksum + length + type)
pub const HEADER_SIZE: usize = 7;

/// Position of a record within a fragmented entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Entry fits in this record
    Full = 1,
    /// First fragment
    First = 2,
    /// Inner fragment
    Middle = 3,
    /// Final fragment
    Last = 4,
}

impl RecordType {
    /// Convert from the on-disk tag
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            _ => Err(Error::corruption(format!("invalid record type: {}", value))),
        }
    }

    /// Pick the tag for a fragment at `offset` of `len` bytes out of `total`.
    pub fn for_fragment(offset: usize, len: usize, total: usize) -> Self {
        if total <= MAX_RECORD_SIZE {
            RecordType::Full
        } else if offset == 0 {
            RecordType::First
        } else if offset + len >= total {
            RecordType::Last
        } else {
            RecordType::Middle
        }
    }
}

/// A framed log record
#[derive(Debug, Clone)]
pub struct Record {
    /// Fragment position
    pub record_type: RecordType,
    /// Payload bytes
    pub data: Vec<u8>,
}

impl Record {
    /// Create a new record
    pub fn new(record_type: RecordType, data: Vec<u8>) -> Self {
        Self { record_type, data }
    }

    /// Encode as `[checksum: u32][length: u16][type: u8][payload]`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_u32_le(Self::checksum(self.record_type, &self.data));
        buf.put_u16_le(self.data.len() as u16);
        buf.put_u8(self.record_type as u8);
        buf.put_slice(&self.data);
        buf.to_vec()
    }

    /// Decode and verify a record
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption(format!("record too short: {} bytes", data.len())));
        }

        let checksum = data.get_u32_le();
        let length = data.get_u16_le() as usize;
        let record_type = RecordType::from_u8(data.get_u8())?;

        if data.len() < length {
            return Err(Error::corruption(format!(
                "incomplete record: expected {} bytes, got {}",
                length,
                data.len()
            )));
        }

        let payload = data[..length].to_vec();
        let expected = Self::checksum(record_type, &payload);
        if checksum != expected {
            return Err(Error::corruption(format!(
                "checksum mismatch: expected {:#x}, got {:#x}",
                expected, checksum
            )));
        }

        Ok(Record { record_type, data: payload })
    }

    fn checksum(record_type: RecordType, data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&[record_type as u8]);
        hasher.update(data);
        hasher.finalize()
    }

    /// Total size of the encoded record
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }
}
