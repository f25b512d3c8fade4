//! Log Segment Module
//!
//! Append-only segment files holding records in write order.
//!
//! ## Responsibilities
//! - Append encoded records to the single active segment
//! - Random reads of exact byte ranges from any segment
//! - Segment naming that sorts in creation order
//!
//! ## Naming
//! ```text
//! {data_dir}/00000000000000000001.data
//! {data_dir}/00000000000000000002.data   <- highest id is reopened as active
//! ```
//! Ids are zero-padded to 20 digits so lexicographic order equals numeric
//! order for the whole `u64` range.

mod reader;
mod writer;

use std::path::{Path, PathBuf};

pub use reader::read_at;
pub use writer::ActiveSegment;

/// Identifier of a segment; larger ids are newer
pub type SegmentId = u64;

/// File extension shared by every segment
pub const SEGMENT_SUFFIX: &str = ".data";

/// Id given to the very first segment of an empty directory
pub const FIRST_SEGMENT_ID: SegmentId = 1;

/// File name for a segment id: "00000000000000000042.data"
pub fn segment_file_name(id: SegmentId) -> String {
    format!("{:020}{}", id, SEGMENT_SUFFIX)
}

/// Full path of a segment inside `dir`
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Parse a segment id from a file name
/// "00000000000000000042.data" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<SegmentId> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
