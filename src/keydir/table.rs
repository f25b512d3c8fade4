//! KeyDir implementation
//!
//! HashMap-based directory; no ordering is needed for exact-key lookups.

use std::collections::HashMap;

use super::Location;

/// In-memory key directory
#[derive(Debug, Default)]
pub struct KeyDir {
    entries: HashMap<Vec<u8>, Location>,
    /// Sum of `len` over all entries
    live_bytes: u64,
}

impl KeyDir {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the location for `key`, returning the old one
    pub fn insert(&mut self, key: Vec<u8>, location: Location) -> Option<Location> {
        self.live_bytes += location.len;
        let previous = self.entries.insert(key, location);
        if let Some(old) = previous {
            self.live_bytes -= old.len;
        }
        previous
    }

    /// Remove `key`, returning its location if it was live
    pub fn remove(&mut self, key: &[u8]) -> Option<Location> {
        let removed = self.entries.remove(key);
        if let Some(old) = removed {
            self.live_bytes -= old.len;
        }
        removed
    }

    /// Location of the latest record for `key`
    pub fn lookup(&self, key: &[u8]) -> Option<Location> {
        self.entries.get(key).copied()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// All (key, location) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Location)> {
        self.entries.iter().map(|(k, loc)| (k.as_slice(), loc))
    }

    /// Keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(|k| k.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes on disk still referenced by the directory
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut dir = KeyDir::new();
        assert!(dir.insert(b"a".to_vec(), Location::new(1, 0, 20)).is_none());

        assert_eq!(dir.lookup(b"a"), Some(Location::new(1, 0, 20)));
        assert_eq!(dir.lookup(b"b"), None);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.live_bytes(), 20);
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut dir = KeyDir::new();
        dir.insert(b"a".to_vec(), Location::new(1, 0, 20));

        let old = dir.insert(b"a".to_vec(), Location::new(2, 40, 25));

        assert_eq!(old, Some(Location::new(1, 0, 20)));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.live_bytes(), 25);
    }

    #[test]
    fn test_remove() {
        let mut dir = KeyDir::new();
        dir.insert(b"a".to_vec(), Location::new(1, 0, 20));
        dir.insert(b"b".to_vec(), Location::new(1, 20, 30));

        assert_eq!(dir.remove(b"a"), Some(Location::new(1, 0, 20)));
        assert_eq!(dir.remove(b"a"), None);
        assert!(!dir.contains_key(b"a"));
        assert_eq!(dir.live_bytes(), 30);
    }

    #[test]
    fn test_iter_visits_every_entry() {
        let mut dir = KeyDir::new();
        for i in 0..10u64 {
            dir.insert(format!("k{}", i).into_bytes(), Location::new(1, i * 10, 10));
        }

        let mut keys: Vec<Vec<u8>> = dir.iter().map(|(k, _)| k.to_vec()).collect();
        keys.sort();
        assert_eq!(keys.len(), 10);
        assert_eq!(keys[0], b"k0".to_vec());
        assert_eq!(dir.keys().count(), 10);
    }
}
