//! Record Codec Module
//!
//! Serializes and deserializes single log records.
//!
//! ## Responsibilities
//! - Fixed big-endian header framing
//! - Argument validation for keys and values
//! - Tombstone detection (value length 0)
//!
//! ## Record Format
//! ```text
//! ┌───────────────┬─────────────┬───────────────┬───────┬─────────┐
//! │ Timestamp (8) │ KeyLen (4)  │ ValueLen (4)  │  Key  │  Value  │
//! └───────────────┴─────────────┴───────────────┴───────┴─────────┘
//!   ValueLen = 0 means tombstone (no value bytes follow)
//! ```

mod codec;

pub use codec::{
    decode_header, decode_record, encode, encode_tombstone, now_secs, Record, RecordHeader,
};

/// Header size: Timestamp (8) + KeyLen (4) + ValueLen (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;
