//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Rebuild the key directory from the segments on startup
//! - Append puts and tombstones to the active segment
//! - Serve reads through the key directory
//! - Rotate the active segment and drive compaction

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use crate::compaction::{self, CompactionStats};
use crate::config::{CompactionPolicy, Config, SyncStrategy};
use crate::data_dir::DataDir;
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, Location};
use crate::record;
use crate::recovery::{RecoveryResult, RecoveryScanner};
use crate::segment::{read_at, ActiveSegment, SegmentId, FIRST_SEGMENT_ID};

/// Point-in-time engine statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub live_keys: usize,
    pub segment_count: usize,
    pub active_segment_id: SegmentId,
    pub active_segment_size: u64,
    /// Bytes held by superseded records, tombstones and torn tails
    pub dead_bytes: u64,
    /// Bytes across all segment files
    pub total_bytes: u64,
}

/// The main storage engine
///
/// ## Concurrency Model: single owner
///
/// Every operation takes `&mut self` (or `&self` for pure lookups), so one
/// call runs to completion before the next starts and `compact` naturally
/// excludes everything else. There is no internal locking; share an engine
/// across threads by wrapping it in a `Mutex` yourself. The data directory
/// lock stops a second engine from opening the same directory.
///
/// ## Durability
/// Every `put`/`delete` flushes the active segment before returning, so a
/// successful call survives a process crash. Surviving a power loss depends
/// on `SyncStrategy`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Locked data directory
    dir: DataDir,

    /// Live key → latest record location
    keydir: KeyDir,

    /// The only segment accepting appends
    active: ActiveSegment,

    /// Sealed segments and their on-disk sizes
    sealed: BTreeMap<SegmentId, u64>,

    /// Bytes compaction would reclaim
    dead_bytes: u64,

    /// Writes since the last storage-level sync (EveryNWrites)
    unsynced_writes: usize,

    /// What the last open found on disk
    recovery: RecoveryResult,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Lock the data directory (creating it if needed)
    /// 2. Drop scratch output of an interrupted compaction
    /// 3. Replay every segment to rebuild the key directory
    /// 4. Cut a torn tail off the newest segment and reopen it as active
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Exclusive handle on the directory
        let dir = DataDir::open(&config.data_dir)?;

        // Step 2: A leftover scratch file was never installed, so it is garbage
        if dir.remove_stale_temp()? {
            tracing::warn!(
                dir = %dir.path().display(),
                "Removed output of an interrupted compaction"
            );
        }

        // Step 3: Replay
        let segment_ids = dir.segment_ids()?;
        let (keydir, recovery) = RecoveryScanner::rebuild(dir.path(), &segment_ids)?;

        // Step 4: Reopen the newest segment, or start the first one
        let active_id = segment_ids.last().copied().unwrap_or(FIRST_SEGMENT_ID);
        let active_path = dir.segment_path(active_id);

        let mut sealed = BTreeMap::new();
        let mut dead_bytes = recovery.dead_bytes;
        for scan in &recovery.scans {
            if scan.segment_id == active_id {
                if scan.is_torn() {
                    // Appending behind garbage would hide new records from
                    // the next replay.
                    Self::truncate_segment(&active_path, scan.valid_len)?;
                    tracing::warn!(
                        segment = active_id,
                        discarded = scan.discarded_bytes(),
                        "Truncated incomplete tail of active segment"
                    );
                }
            } else {
                sealed.insert(scan.segment_id, scan.file_len);
                dead_bytes += scan.discarded_bytes();
            }
        }

        let active = ActiveSegment::open(&active_path, active_id)?;
        if segment_ids.is_empty() {
            dir.sync()?;
        }

        tracing::info!(
            dir = %dir.path().display(),
            segments = recovery.segments_scanned,
            records = recovery.records_recovered,
            tombstones = recovery.tombstones_applied,
            live_keys = keydir.len(),
            torn_segments = recovery.truncated_segments.len(),
            active_segment = active_id,
            "Engine opened"
        );

        Ok(Self {
            config,
            dir,
            keydir,
            active,
            sealed,
            dead_bytes,
            unsynced_writes: 0,
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Returns `None` for absent keys. A directory entry whose record can no
    /// longer be read or decoded is evicted and also reported as absent.
    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let location = self.keydir.lookup(key)?;

        match self.read_value(key, location) {
            Ok(value) => Some(value),
            Err(e) => {
                let reason = if e.is_decode_error() {
                    "record corrupted since indexing"
                } else {
                    "segment unreadable"
                };
                tracing::warn!(
                    segment = location.segment_id,
                    offset = location.offset,
                    reason,
                    error = %e,
                    "Evicting stale directory entry"
                );
                self.keydir.remove(key);
                None
            }
        }
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Validate and encode the record
    /// 2. Append + flush to the active segment
    /// 3. Point the key directory at the new record
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(CaskError::InvalidArgument(
                "value must not be empty; a zero-length value marks a deletion".to_string(),
            ));
        }

        // Step 1: Encode (rejects empty and oversized keys)
        let bytes = record::encode(record::now_secs(), key, value)?;

        // Step 2: Durable append; the directory is untouched on failure
        let location = self.append_record(&bytes)?;

        // Step 3: Update directory
        if let Some(old) = self.keydir.insert(key.to_vec(), location) {
            self.dead_bytes += old.len;
        }

        self.maybe_compact();
        Ok(())
    }

    /// Delete a key
    ///
    /// No-op for absent keys. The directory entry is only removed once the
    /// tombstone has been written, so a failed delete keeps the key readable.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        if !self.keydir.contains_key(key) {
            return Ok(());
        }

        // Step 1: Write tombstone
        let bytes = record::encode_tombstone(record::now_secs(), key)?;
        let tombstone = self.append_record(&bytes)?;

        // Step 2: Forget the key
        if let Some(old) = self.keydir.remove(key) {
            self.dead_bytes += old.len;
        }
        self.dead_bytes += tombstone.len;

        self.maybe_compact();
        Ok(())
    }

    /// Rewrite all live keys into a single new segment
    ///
    /// Either the whole compaction is installed or nothing changes; see
    /// `compaction` for the crash-safety ordering.
    pub fn compact(&mut self) -> Result<CompactionStats> {
        // Step 1: Everything written so far must be on disk before we copy it
        self.active.sync()?;
        self.unsynced_writes = 0;

        let bytes_before = self.total_bytes();
        let retired: Vec<SegmentId> = self
            .sealed
            .keys()
            .copied()
            .chain(std::iter::once(self.active.id()))
            .collect();
        let new_id = self.active.id() + 1;

        // Steps 2-3: Copy live records into the scratch file
        let compacted = match compaction::write_live_set(&self.dir, &self.keydir, new_id) {
            Ok(compacted) => compacted,
            Err(e) => return Err(self.abandon_compaction(new_id, e)),
        };

        // Step 4: Install before anything is deleted
        let installed = compaction::install(&self.dir, &compacted)
            .and_then(|_| ActiveSegment::open(&self.dir.segment_path(new_id), new_id));
        let new_active = match installed {
            Ok(segment) => segment,
            Err(e) => return Err(self.abandon_compaction(new_id, e)),
        };

        // Step 5: Repoint the directory and switch the active segment
        for (key, location) in &compacted.relocations {
            self.keydir.insert(key.clone(), *location);
        }
        drop(std::mem::replace(&mut self.active, new_active));
        self.sealed.clear();
        self.dead_bytes = 0;

        // Step 6: Retire the old segments
        let (removed, failure) = compaction::remove_segments(&self.dir, &retired);

        let stats = CompactionStats {
            new_segment_id: new_id,
            live_keys: compacted.relocations.len() as u64,
            bytes_before,
            bytes_after: compacted.len,
            segments_removed: removed as u64,
        };

        tracing::info!(
            new_segment = new_id,
            live_keys = stats.live_keys,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            reclaimed = stats.bytes_reclaimed(),
            "Compaction finished"
        );

        let Some(e) = failure else {
            return Ok(stats);
        };

        // Leftovers are a suffix of the old log holding only superseded
        // records; keep tracking them so the next compaction retries.
        tracing::warn!(
            segment = retired[removed],
            leftover = retired.len() - removed,
            error = %e,
            "Failed to remove retired segment"
        );
        for &id in &retired[removed..] {
            let size = std::fs::metadata(self.dir.segment_path(id))
                .map(|m| m.len())
                .unwrap_or(0);
            self.sealed.insert(id, size);
            self.dead_bytes += size;
        }
        Err(e.into())
    }

    /// Force a storage-level sync of the active segment
    pub fn sync(&mut self) -> Result<()> {
        self.active.sync()?;
        self.unsynced_writes = 0;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Syncs the active segment; the directory lock is released on return.
    pub fn close(mut self) -> Result<()> {
        self.sync()?;
        tracing::info!(dir = %self.dir.path().display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Whether `key` is live
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.keydir.contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    /// Live keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.keydir.keys()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// What the last open replayed
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            live_keys: self.keydir.len(),
            segment_count: self.sealed.len() + 1,
            active_segment_id: self.active.id(),
            active_segment_size: self.active.len(),
            dead_bytes: self.dead_bytes,
            total_bytes: self.total_bytes(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_value(&self, key: &[u8], location: Location) -> Result<Vec<u8>> {
        let path = self.dir.segment_path(location.segment_id);
        let bytes = read_at(&path, location.offset, location.len)?;
        let found = record::decode_record(&bytes)?;

        if found.key != key || found.is_tombstone() {
            return Err(CaskError::KeyMismatch);
        }
        Ok(found.value)
    }

    /// Append, flush, and sync per strategy; returns the new record's location
    fn append_record(&mut self, bytes: &[u8]) -> Result<Location> {
        let len = bytes.len() as u64;
        if !self.active.is_empty() && self.active.len() + len > self.config.max_segment_size {
            self.rotate()?;
        }

        let offset = self.active.append(bytes)?;
        self.active.flush()?;

        match self.config.sync_strategy {
            SyncStrategy::Flush => {}
            SyncStrategy::EveryWrite => self.active.sync()?,
            SyncStrategy::EveryNWrites { count } => {
                self.unsynced_writes += 1;
                if self.unsynced_writes >= count {
                    self.active.sync()?;
                    self.unsynced_writes = 0;
                }
            }
        }

        Ok(Location::new(self.active.id(), offset, len))
    }

    /// Seal the active segment and start the next one
    fn rotate(&mut self) -> Result<()> {
        self.active.sync()?;
        self.unsynced_writes = 0;

        let next_id = self.active.id() + 1;
        let next = ActiveSegment::open(&self.dir.segment_path(next_id), next_id)?;
        self.dir.sync()?;

        let sealed = std::mem::replace(&mut self.active, next);
        self.sealed.insert(sealed.id(), sealed.len());

        tracing::info!(
            sealed = sealed.id(),
            size = sealed.len(),
            active = next_id,
            "Rotated active segment"
        );
        Ok(())
    }

    /// Clean up after a compaction that never switched over; returns `cause`
    fn abandon_compaction(&self, new_id: SegmentId, cause: CaskError) -> CaskError {
        tracing::warn!(new_segment = new_id, error = %cause, "Compaction aborted");
        if let Err(e) = compaction::abandon(&self.dir, new_id) {
            tracing::error!(new_segment = new_id, error = %e, "Failed to remove aborted compaction output");
        }
        cause
    }

    fn total_bytes(&self) -> u64 {
        self.sealed.values().sum::<u64>() + self.active.len()
    }

    /// Run compaction if the configured policy asks for it
    ///
    /// The write that triggered it has already succeeded, so a failed
    /// compaction is logged rather than returned.
    fn maybe_compact(&mut self) {
        let CompactionPolicy::DeadBytes {
            min_dead_bytes,
            min_dead_ratio,
        } = self.config.compaction_policy
        else {
            return;
        };

        let total = self.total_bytes();
        if total == 0 || self.dead_bytes < min_dead_bytes {
            return;
        }
        if (self.dead_bytes as f64 / total as f64) < min_dead_ratio {
            return;
        }

        tracing::debug!(
            dead_bytes = self.dead_bytes,
            total_bytes = total,
            "Compaction policy triggered"
        );
        if let Err(e) = self.compact() {
            tracing::warn!(error = %e, "Automatic compaction failed");
        }
    }

    fn truncate_segment(path: &Path, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_segments(temp: &TempDir, size: u64) -> Engine {
        let config = Config::builder()
            .data_dir(temp.path())
            .max_segment_size(size)
            .build();
        Engine::open(config).unwrap()
    }

    #[test]
    fn test_rotation_seals_full_segment() {
        let temp = TempDir::new().unwrap();
        let mut engine = small_segments(&temp, 40);

        engine.put(b"a", b"1").unwrap(); // 18 bytes
        engine.put(b"b", b"2").unwrap(); // 36 bytes
        engine.put(b"c", b"3").unwrap(); // would be 54 → rotate

        let stats = engine.stats();
        assert_eq!(stats.segment_count, 2);
        assert_eq!(stats.active_segment_id, 2);
        assert_eq!(stats.active_segment_size, 18);
        assert_eq!(engine.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(engine.get(b"c"), Some(b"3".to_vec()));
    }

    #[test]
    fn test_oversized_record_still_written() {
        let temp = TempDir::new().unwrap();
        let mut engine = small_segments(&temp, 8);

        engine.put(b"big", &[7u8; 64]).unwrap();

        assert_eq!(engine.stats().segment_count, 1);
        assert_eq!(engine.get(b"big"), Some(vec![7u8; 64]));
    }

    #[test]
    fn test_dead_bytes_accounting() {
        let temp = TempDir::new().unwrap();
        let mut engine = small_segments(&temp, 1024);

        engine.put(b"k", b"v1").unwrap(); // 19
        engine.put(b"k", b"v2").unwrap(); // 19, first is dead
        assert_eq!(engine.stats().dead_bytes, 19);

        engine.delete(b"k").unwrap(); // 17 tombstone + 19 live
        assert_eq!(engine.stats().dead_bytes, 19 + 19 + 17);
        assert_eq!(engine.stats().total_bytes, 19 + 19 + 17);
    }

    #[test]
    fn test_empty_value_rejected() {
        let temp = TempDir::new().unwrap();
        let mut engine = small_segments(&temp, 1024);

        let err = engine.put(b"k", b"").unwrap_err();
        assert!(matches!(err, CaskError::InvalidArgument(_)));
        assert!(engine.is_empty());
        assert_eq!(engine.stats().total_bytes, 0);
    }

    #[test]
    fn test_policy_triggers_compaction() {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .compaction_policy(CompactionPolicy::DeadBytes {
                min_dead_bytes: 50,
                min_dead_ratio: 0.5,
            })
            .build();
        let mut engine = Engine::open(config).unwrap();

        for i in 0..10u8 {
            engine.put(b"k", &[b'0' + i]).unwrap();
        }

        let stats = engine.stats();
        assert!(stats.active_segment_id > 1);
        assert!(stats.dead_bytes < 50);
        assert_eq!(engine.get(b"k"), Some(b"9".to_vec()));
    }
}
