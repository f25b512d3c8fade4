//! Key Directory Module
//!
//! In-memory map from each live key to the location of its latest record.
//!
//! ## Responsibilities
//! - Exact-key lookup of record locations
//! - Track live bytes for compaction decisions
//! - Unordered iteration for compaction
//!
//! The directory is never persisted. It is rebuilt from the segments on
//! every open and repointed after every compaction; the log stays the
//! source of truth. It is owned by a single `Engine` and has no locking.

mod table;

pub use table::KeyDir;

use crate::segment::SegmentId;

/// Where a record lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Segment holding the record
    pub segment_id: SegmentId,

    /// Byte offset of the record header within the segment
    pub offset: u64,

    /// Header + key + value, so reads need no delimiter
    pub len: u64,
}

impl Location {
    pub fn new(segment_id: SegmentId, offset: u64, len: u64) -> Self {
        Self {
            segment_id,
            offset,
            len,
        }
    }
}
