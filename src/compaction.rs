//! Compaction Module
//!
//! Rewrites the live key set into one fresh segment and retires the rest.
//!
//! ## Protocol
//! ```text
//! 1. sync active segment              (engine holds &mut self: writes paused)
//! 2. write live records → compact.tmp (fresh timestamps)
//! 3. sync compact.tmp
//! 4. rename compact.tmp → {new_id}.data, fsync directory   <- install
//! 5. repoint key directory, reopen active on {new_id}
//! 6. remove every segment older than {new_id}, fsync directory
//! ```
//! `new_id` is greater than every existing id, so a crash between 4 and 6
//! leaves old and new segments side by side and replay still ends on the
//! compacted values. A crash before 4 leaves only the scratch file, which
//! the next open deletes.

use std::fs;

use crate::data_dir::DataDir;
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, Location};
use crate::record;
use crate::segment::{read_at, ActiveSegment, SegmentId};

/// Summary of a finished compaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Id of the segment holding the compacted records
    pub new_segment_id: SegmentId,

    /// Keys rewritten
    pub live_keys: u64,

    /// Segment bytes before compaction
    pub bytes_before: u64,

    /// Size of the compacted segment
    pub bytes_after: u64,

    /// Old segment files deleted
    pub segments_removed: u64,
}

impl CompactionStats {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// A compacted segment written to the scratch path but not yet installed
pub struct CompactedSegment {
    pub id: SegmentId,

    /// New location of every live key
    pub relocations: Vec<(Vec<u8>, Location)>,

    pub len: u64,
}

/// Copy the latest value of every live key into the scratch file
///
/// Nothing outside the scratch file is modified. Any read, decode or write
/// failure aborts and leaves the existing segments authoritative.
pub fn write_live_set(dir: &DataDir, keydir: &KeyDir, id: SegmentId) -> Result<CompactedSegment> {
    let temp_path = dir.compact_temp_path();
    if temp_path.exists() {
        fs::remove_file(&temp_path)?;
    }

    let mut output = ActiveSegment::open(&temp_path, id)?;
    let mut relocations = Vec::with_capacity(keydir.len());

    for (key, location) in keydir.iter() {
        let bytes = read_at(
            &dir.segment_path(location.segment_id),
            location.offset,
            location.len,
        )?;
        let old = record::decode_record(&bytes)?;
        if old.key != key {
            return Err(CaskError::KeyMismatch);
        }

        let fresh = record::encode(record::now_secs(), key, &old.value)?;
        let offset = output.append(&fresh)?;
        relocations.push((key.to_vec(), Location::new(id, offset, fresh.len() as u64)));
    }

    output.sync()?;
    let len = output.len();

    Ok(CompactedSegment {
        id,
        relocations,
        len,
    })
}

/// Move the scratch file to its final segment name and make it durable
pub fn install(dir: &DataDir, compacted: &CompactedSegment) -> Result<()> {
    fs::rename(dir.compact_temp_path(), dir.segment_path(compacted.id))?;
    dir.sync()?;
    Ok(())
}

/// Roll back a compaction that failed before the engine switched over
///
/// A stray compacted segment would outrank every later write to the old
/// active segment on the next replay, so it must not survive.
pub fn abandon(dir: &DataDir, id: SegmentId) -> Result<()> {
    for path in [dir.compact_temp_path(), dir.segment_path(id)] {
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    dir.sync()
}

/// Delete retired segments oldest first, stopping at the first failure
///
/// Returns how many were removed and the error that stopped removal, if any.
/// Whatever survives is always a suffix of the old log, so a tombstone is
/// never removed while an older put for the same key stays on disk.
///
/// Must only run after `install`. `ids` must be in ascending order.
pub fn remove_segments(dir: &DataDir, ids: &[SegmentId]) -> (usize, Option<std::io::Error>) {
    let mut removed = 0;
    let mut failure = None;
    for &id in ids {
        if let Err(e) = fs::remove_file(dir.segment_path(id)) {
            failure = Some(e);
            break;
        }
        removed += 1;
    }

    if let Err(e) = dir.sync() {
        tracing::warn!(error = %e, "Failed to sync data directory after removing segments");
    }

    (removed, failure)
}
