//! crates/social_feed_core/src/storage.rs
//!
//! JSON-safe access to the persistent key-value store. Corrupt entries are
//! deleted on read and every failure is reported as absence or `false`, never
//! as an error the caller has to handle.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

use crate::ports::{KeyValueStore, PortError, PortResult};

/// Stored strings that mean "nothing here".
const SENTINELS: [&str; 2] = ["undefined", "null"];

fn is_absent(raw: &str) -> bool {
    raw.is_empty() || SENTINELS.contains(&raw)
}

/// Wraps a [`KeyValueStore`] so malformed or stale entries are discarded
/// instead of crashing the client.
#[derive(Clone)]
pub struct StorageGuard {
    store: Arc<dyn KeyValueStore>,
}

impl StorageGuard {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the parsed value, or `None` when absent, a sentinel, or
    /// unparseable. Unparseable entries are removed.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Error parsing stored item \"{}\": {}", key, e);
                if let Err(e) = self.store.remove(key) {
                    warn!("Failed to remove corrupt item \"{}\": {}", key, e);
                }
                None
            }
        }
    }

    /// Like [`read`](Self::read) without JSON parsing.
    pub fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(Some(raw)) if !is_absent(&raw) => Some(raw),
            Ok(_) => None,
            Err(e) => {
                error!("Error reading stored item \"{}\": {}", key, e);
                None
            }
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!("Error serializing item \"{}\": {}", key, e);
                return false;
            }
        };
        self.write_raw(key, &serialized)
    }

    pub fn write_raw(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                error!("Error setting stored item \"{}\": {}", key, e);
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                error!("Error removing stored item \"{}\": {}", key, e);
                false
            }
        }
    }

    /// Wipes every key. Used as the last-resort recovery action.
    pub fn clear(&self) -> bool {
        match self.store.clear() {
            Ok(()) => true,
            Err(e) => {
                error!("Error clearing storage: {}", e);
                false
            }
        }
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

/// A process-local [`KeyValueStore`]. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.data
            .lock()
            .map_err(|_| PortError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}
