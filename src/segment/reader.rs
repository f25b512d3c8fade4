//! Random-access segment reads
//!
//! Each read opens its own short-lived handle, so sealed segments never keep
//! a descriptor open between calls.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{CaskError, Result};

/// Read exactly `len` bytes starting at `offset`
///
/// Returns `TruncatedRecord` if the file ends before `offset + len`.
pub fn read_at(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;

    if (buf.len() as u64) < len {
        return Err(CaskError::TruncatedRecord {
            expected: len as usize,
            actual: buf.len(),
        });
    }

    Ok(buf)
}
