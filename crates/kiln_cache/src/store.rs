//! Persisted key to fingerprint mapping.
//!
//! The store is a flat property file loaded once when opened and rewritten
//! atomically on every change. One lock serializes all access, so units
//! building in parallel never interleave writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::CacheError;
use crate::properties;

/// Header written at the top of the property file.
const STORE_HEADER: &str = "Kiln fingerprint store. Generated file, do not edit.";

/// Durable string-to-string map of last known fingerprints.
///
/// Keys are unit names plus the reserved self-fingerprint key. Every
/// [`save`](Self::save) and [`remove`](Self::remove) writes through to disk
/// immediately; there is no transaction spanning several keys.
#[derive(Debug)]
pub struct FingerprintStore {
    /// Location of the property file.
    path: PathBuf,

    /// In-memory copy of the file contents.
    entries: Mutex<BTreeMap<String, String>>,
}

impl FingerprintStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. Lines that cannot be parsed are
    /// dropped (the affected units simply rebuild).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => properties::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened fingerprint store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `value` under `key` and flushes the file.
    pub fn save(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    /// Removes `key` and flushes the file. Returns whether the key existed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.flush(&entries)?;
        Ok(true)
    }

    /// Returns every stored key in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Rewrites the backing file. Called with the lock held.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let text = properties::format(STORE_HEADER, entries);
        kiln_common::write_atomic(&self.path, text.as_bytes()).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join(".kiln").join("fingerprints.properties")
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::open(store_path(&dir)).unwrap();
        assert!(store.keys().is_empty());
        assert!(store.get("core").is_none());
        assert!(!store_path(&dir).exists());
    }

    #[test]
    fn save_is_write_through() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::open(store_path(&dir)).unwrap();
        store.save("core", "q83vAQIDBAUGBwgJCg==").unwrap();

        let reopened = FingerprintStore::open(store_path(&dir)).unwrap();
        assert_eq!(reopened.get("core").as_deref(), Some("q83vAQIDBAUGBwgJCg=="));
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::open(store_path(&dir)).unwrap();
        store.save("a", "1").unwrap();
        store.save("b", "2").unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());

        let reopened = FingerprintStore::open(store_path(&dir)).unwrap();
        assert_eq!(reopened.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn file_is_sorted_property_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::open(store_path(&dir)).unwrap();
        store.save("zeta", "1").unwrap();
        store.save("alpha", "2").unwrap();

        let text = std::fs::read_to_string(store_path(&dir)).unwrap();
        let body: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(body, vec!["alpha=2", "zeta=1"]);
    }

    #[test]
    fn concurrent_saves_all_land() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FingerprintStore::open(store_path(&dir)).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.save(&format!("unit{i}"), &i.to_string()).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let reopened = FingerprintStore::open(store_path(&dir)).unwrap();
        assert_eq!(reopened.keys().len(), 8);
    }

    #[test]
    fn unreadable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a property file.
        let err = FingerprintStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
