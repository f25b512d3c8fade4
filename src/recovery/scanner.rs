//! Sequential segment scanner
//!
//! Walks a segment from offset 0 and yields every fully written record,
//! stopping silently at the first torn or corrupt one.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::keydir::Location;
use crate::record::{self, HEADER_SIZE};
use crate::segment::SegmentId;

/// A record found during a scan (value bytes are skipped, not loaded)
#[derive(Debug, Clone)]
pub struct ScannedRecord {
    pub key: Vec<u8>,
    pub timestamp: u64,
    pub location: Location,
    pub is_tombstone: bool,
}

/// Outcome of scanning one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentScan {
    pub segment_id: SegmentId,

    /// Non-tombstone records decoded
    pub records: u64,

    /// Tombstones decoded
    pub tombstones: u64,

    /// End offset of the last complete record
    pub valid_len: u64,

    /// Size of the file when the scan started
    pub file_len: u64,
}

impl SegmentScan {
    /// Whether bytes after the valid prefix were ignored
    pub fn is_torn(&self) -> bool {
        self.valid_len < self.file_len
    }

    /// Bytes ignored after the valid prefix
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Scan `path` and hand every complete record to `visit`, in log order
///
/// Only I/O failures opening or reading the file are errors; a short header,
/// short body, or zero-length key ends the scan at the previous boundary.
pub fn scan_segment<F>(path: &Path, segment_id: SegmentId, mut visit: F) -> Result<SegmentScan>
where
    F: FnMut(ScannedRecord),
{
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut scan = SegmentScan {
        segment_id,
        records: 0,
        tombstones: 0,
        valid_len: 0,
        file_len,
    };

    let mut header_buf = [0u8; HEADER_SIZE];
    loop {
        let offset = scan.valid_len;

        let read = read_full(&mut reader, &mut header_buf)?;
        if read < HEADER_SIZE {
            break;
        }

        let header = record::decode_header(&header_buf)?;
        let record_len = header.record_len();

        // Bound the body by the file size before allocating for the key
        if header.key_len == 0 || offset + record_len > file_len {
            break;
        }

        let mut key = vec![0u8; header.key_len as usize];
        if read_full(&mut reader, &mut key)? < key.len() {
            break;
        }
        reader.seek_relative(header.value_len as i64)?;

        let is_tombstone = header.is_tombstone();
        if is_tombstone {
            scan.tombstones += 1;
        } else {
            scan.records += 1;
        }

        visit(ScannedRecord {
            key,
            timestamp: header.timestamp,
            location: Location::new(segment_id, offset, record_len),
            is_tombstone,
        });

        scan.valid_len = offset + record_len;
    }

    Ok(scan)
}

/// Fill `buf` as far as the reader allows, returning the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
