//! Data directory handle
//!
//! Owns the exclusive lock on a data directory and knows its file layout.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{CaskError, Result};
use crate::segment::{self, SegmentId};

/// Lock file held for the lifetime of an engine
pub const LOCK_FILE: &str = "LOCK";

/// Scratch file compaction writes into before it is installed
pub const COMPACT_TEMP_FILE: &str = "compact.tmp";

/// An exclusively locked data directory
///
/// Only one handle per directory may exist at a time; the lock is released
/// when this value is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Create the directory if needed and take the exclusive lock
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CaskError::DirectoryLocked(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the segment with the given id
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        segment::segment_path(&self.path, id)
    }

    /// Path of the compaction scratch file
    pub fn compact_temp_path(&self) -> PathBuf {
        self.path.join(COMPACT_TEMP_FILE)
    }

    /// Segment ids present on disk, oldest first
    pub fn segment_ids(&self) -> Result<Vec<SegmentId>> {
        list_segment_ids(&self.path)
    }

    /// Remove a scratch file left behind by an interrupted compaction
    ///
    /// Returns true if one was found.
    pub fn remove_stale_temp(&self) -> Result<bool> {
        let temp = self.compact_temp_path();
        if !temp.exists() {
            return Ok(false);
        }
        fs::remove_file(&temp)?;
        self.sync()?;
        Ok(true)
    }

    /// Make file creations, renames and removals in the directory durable
    #[cfg(unix)]
    pub fn sync(&self) -> Result<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sync(&self) -> Result<()> {
        // Directory handles cannot be fsynced on this platform
        Ok(())
    }
}

/// Segment ids found in `dir`, sorted oldest first
///
/// Files that do not follow the segment naming scheme are ignored.
pub fn list_segment_ids(dir: &Path) -> Result<Vec<SegmentId>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_path = entry.path();

        if file_path.is_file() {
            if let Some(id) = segment::parse_segment_id(&file_path) {
                ids.push(id);
            }
        }
    }

    ids.sort_unstable();
    Ok(ids)
}
