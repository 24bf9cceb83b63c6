//! services/client/src/adapters/file_store.rs
//!
//! This module contains the on-disk key-value store, the concrete
//! implementation of the `KeyValueStore` port. All keys live in one JSON
//! object file, rewritten through a temporary file on every change.

use social_feed_core::ports::{KeyValueStore, PortError, PortResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

type Entries = BTreeMap<String, String>;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-backed store scoped to one profile on this machine.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates a `FileStore`. The file is created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> PortResult<Entries> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(PortError::Storage(e.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), "Storage file is unreadable, starting empty: {}", e);
                Ok(Entries::new())
            }
        }
    }

    fn save(&self, entries: &Entries) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PortError::Storage(e.to_string()))?;
            }
        }
        let serialized =
            serde_json::to_string_pretty(entries).map_err(|e| PortError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized).map_err(|e| PortError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| PortError::Storage(e.to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut Entries)) -> PortResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PortError::Storage("file store lock poisoned".to_string()))?;
        let mut entries = self.load()?;
        f(&mut entries);
        self.save(&entries)
    }
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PortError::Storage("file store lock poisoned".to_string()))?;
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> PortResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PortError::Storage("file store lock poisoned".to_string()))?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("storage.json"));
        (dir, store)
    }

    #[test]
    fn values_survive_a_new_instance() {
        let (_dir, store) = store();
        store.set("token", "abc").unwrap();
        store.set("user", r#"{"id":"1"}"#).unwrap();

        let reopened = FileStore::new(store.path());
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get("user").unwrap().as_deref(), Some(r#"{"id":"1"}"#));
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, store) = store();
        assert_eq!(store.get("token").unwrap(), None);
        store.remove("token").unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn clear_deletes_the_file() {
        let (_dir, store) = store();
        store.set("token", "abc").unwrap();
        assert!(store.path().exists());
        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    fn garbage_file_is_replaced_on_next_write() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json at all").unwrap();

        assert_eq!(store.get("token").unwrap(), None);
        store.set("token", "fresh").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("fresh"));
    }
}
