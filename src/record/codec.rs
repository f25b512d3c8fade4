//! Record encoding and decoding

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

use super::HEADER_SIZE;

/// Decoded fixed-size header of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Write time, unix seconds
    pub timestamp: u64,
    pub key_len: u32,
    pub value_len: u32,
}

impl RecordHeader {
    /// A zero value length marks a deletion
    pub fn is_tombstone(&self) -> bool {
        self.value_len == 0
    }

    /// Length of the key and value bytes that follow the header
    pub fn body_len(&self) -> u64 {
        self.key_len as u64 + self.value_len as u64
    }

    /// Total on-disk length: header + key + value
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.body_len()
    }
}

/// A fully decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: u64,
    pub key: Vec<u8>,
    /// Empty for tombstones
    pub value: Vec<u8>,
}

impl Record {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Encode a record: header followed by raw key and value bytes
///
/// An empty `value` produces a tombstone.
pub fn encode(timestamp: u64, key: &[u8], value: &[u8]) -> Result<Bytes> {
    let key_len = checked_len("key", key)?;
    let value_len = checked_len("value", value)?;

    if key_len == 0 {
        return Err(CaskError::InvalidArgument(
            "key must not be empty".to_string(),
        ));
    }

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
    buf.put_u64(timestamp);
    buf.put_u32(key_len);
    buf.put_u32(value_len);
    buf.put_slice(key);
    buf.put_slice(value);

    Ok(buf.freeze())
}

/// Encode a tombstone for `key`
pub fn encode_tombstone(timestamp: u64, key: &[u8]) -> Result<Bytes> {
    encode(timestamp, key, &[])
}

/// Decode the fixed header from the start of `bytes`
///
/// Fails with `MalformedHeader` if fewer than `HEADER_SIZE` bytes are given.
pub fn decode_header(bytes: &[u8]) -> Result<RecordHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(CaskError::MalformedHeader {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut buf = &bytes[..HEADER_SIZE];
    Ok(RecordHeader {
        timestamp: buf.get_u64(),
        key_len: buf.get_u32(),
        value_len: buf.get_u32(),
    })
}

/// Decode a whole record from a byte range read at a known location
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    let header = decode_header(bytes)?;

    let expected = header.record_len() as usize;
    if bytes.len() < expected {
        return Err(CaskError::TruncatedRecord {
            expected,
            actual: bytes.len(),
        });
    }

    let key_end = HEADER_SIZE + header.key_len as usize;
    Ok(Record {
        timestamp: header.timestamp,
        key: bytes[HEADER_SIZE..key_end].to_vec(),
        value: bytes[key_end..expected].to_vec(),
    })
}

/// Current wall-clock time in whole seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn checked_len(what: &str, bytes: &[u8]) -> Result<u32> {
    u32::try_from(bytes.len()).map_err(|_| {
        CaskError::InvalidArgument(format!(
            "{} length {} exceeds the 4-byte length field",
            what,
            bytes.len()
        ))
    })
}
