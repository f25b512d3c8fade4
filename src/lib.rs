//! # CaskKV
//!
//! A Bitcask-style log-structured key-value storage engine with:
//! - Append-only segment files with a fixed big-endian record format
//! - An in-memory key directory rebuilt from the log on every open
//! - Crash recovery that keeps the valid prefix of a torn segment
//! - Compaction that installs the new segment before retiring old ones
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │             put / get / delete / compact (&mut self)         │
//! └──────────┬──────────────────┬──────────────────┬────────────┘
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//!   ┌────────────────┐  ┌───────────────┐  ┌───────────────┐
//!   │  Record Codec  │  │    KeyDir     │  │  Compaction   │
//!   │  (encode/dec)  │  │  (in-memory)  │  │ (tmp→rename)  │
//!   └───────┬────────┘  └───────▲───────┘  └───────┬───────┘
//!           │                   │                  │
//!           ▼                   │                  ▼
//!   ┌────────────────┐  ┌───────┴───────┐  ┌───────────────┐
//!   │  Log Segments  │─▶│   Recovery    │  │   Data Dir    │
//!   │ (append/read)  │  │   (replay)    │  │ (lock/fsync)  │
//!   └────────────────┘  └───────────────┘  └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod segment;
pub mod keydir;
pub mod recovery;
pub mod data_dir;
pub mod compaction;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{CompactionPolicy, Config, SyncStrategy};
pub use compaction::CompactionStats;
pub use engine::{Engine, EngineStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
