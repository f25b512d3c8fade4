//! Recovery Module
//!
//! Rebuilds the key directory by replaying every segment at startup.
//!
//! ## Responsibilities
//! - Replay segments oldest → newest so the last write wins
//! - Apply tombstones across segment boundaries
//! - Treat a torn or corrupt tail as the end of that segment, not an error
//! - Count stale bytes for the compaction policy
//!
//! ## Replay Rules
//! ```text
//! for segment in ascending id order:
//!     for record in segment (until first incomplete record):
//!         tombstone → remove key
//!         otherwise → key = (segment, offset, record_len)
//! ```

mod scanner;

use std::path::Path;

use crate::data_dir::list_segment_ids;
use crate::error::Result;
use crate::keydir::KeyDir;
use crate::segment::{segment_path, SegmentId};

pub use scanner::{scan_segment, ScannedRecord, SegmentScan};

/// Result of a recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of segment files replayed
    pub segments_scanned: u64,

    /// Non-tombstone records replayed
    pub records_recovered: u64,

    /// Tombstones replayed
    pub tombstones_applied: u64,

    /// Bytes past the valid prefix of each segment, summed
    pub bytes_discarded: u64,

    /// Segments that ended in an incomplete record
    pub truncated_segments: Vec<SegmentId>,

    /// Bytes held by superseded records and tombstones
    pub dead_bytes: u64,

    /// Bytes in the valid prefixes of all segments
    pub total_bytes: u64,

    /// Per-segment scan results, in replay order
    pub scans: Vec<SegmentScan>,
}

impl RecoveryResult {
    /// Whether any segment had a torn tail
    pub fn was_truncated(&self) -> bool {
        !self.truncated_segments.is_empty()
    }
}

/// Replays segments into a fresh key directory
pub struct RecoveryScanner;

impl RecoveryScanner {
    /// Replay the given segments (must be sorted oldest first)
    pub fn rebuild(dir: &Path, segment_ids: &[SegmentId]) -> Result<(KeyDir, RecoveryResult)> {
        let mut keydir = KeyDir::new();
        let mut result = RecoveryResult::default();

        for &id in segment_ids {
            let scan = Self::replay_segment(dir, id, &mut keydir, &mut result)?;

            tracing::debug!(
                segment = id,
                records = scan.records,
                tombstones = scan.tombstones,
                valid_len = scan.valid_len,
                "Replayed segment"
            );

            if scan.is_torn() {
                tracing::warn!(
                    segment = id,
                    valid_len = scan.valid_len,
                    discarded = scan.discarded_bytes(),
                    "Ignoring incomplete tail of segment"
                );
                result.truncated_segments.push(id);
            }

            result.segments_scanned += 1;
            result.records_recovered += scan.records;
            result.tombstones_applied += scan.tombstones;
            result.bytes_discarded += scan.discarded_bytes();
            result.total_bytes += scan.valid_len;
            result.scans.push(scan);
        }

        Ok((keydir, result))
    }

    fn replay_segment(
        dir: &Path,
        id: SegmentId,
        keydir: &mut KeyDir,
        result: &mut RecoveryResult,
    ) -> Result<SegmentScan> {
        let dead_bytes = &mut result.dead_bytes;

        scan_segment(&segment_path(dir, id), id, |record| {
            if record.is_tombstone {
                // The tombstone itself is reclaimable once compaction drops
                // every older record for the key.
                *dead_bytes += record.location.len;
                if let Some(old) = keydir.remove(&record.key) {
                    *dead_bytes += old.len;
                }
            } else if let Some(old) = keydir.insert(record.key, record.location) {
                *dead_bytes += old.len;
            }
        })
    }
}

/// Scan every segment in `dir` without touching any file
///
/// Used for offline inspection; the engine uses `RecoveryScanner::rebuild`.
pub fn verify(dir: &Path) -> Result<(KeyDir, RecoveryResult)> {
    let ids = list_segment_ids(dir)?;
    RecoveryScanner::rebuild(dir, &ids)
}
