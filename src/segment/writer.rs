//! Active segment writer
//!
//! Appends records to the one segment that still grows.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::SegmentId;

/// The segment currently accepting appends
///
/// Holds the only write handle into the data directory. Dropping it flushes
/// buffered bytes; call `sync` for a storage-level guarantee.
pub struct ActiveSegment {
    id: SegmentId,
    path: PathBuf,
    /// Buffered writer in append mode
    writer: BufWriter<File>,
    /// Logical length including buffered bytes (next append offset)
    len: u64,
}

impl ActiveSegment {
    /// Open a segment for appending, creating it if absent
    pub fn open(path: &Path, id: SegmentId) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let len = file.metadata()?.len();

        Ok(Self {
            id,
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            len,
        })
    }

    /// Append encoded record bytes, returning the offset where they begin
    pub fn append(&mut self, record: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.writer.write_all(record)?;
        self.len += record.len() as u64;
        Ok(offset)
    }

    /// Push buffered bytes to the OS so random reads can see them
    ///
    /// Does not survive a power loss; see `sync`.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and force the data to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length in bytes (offset of the next append)
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for ActiveSegment {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(segment = self.id, error = %e, "Failed to flush segment on drop");
        }
    }
}
