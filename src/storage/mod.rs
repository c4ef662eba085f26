//! Persistent key/value storage.
//!
//! The chat client keeps its per-module session slot and the pending draft in
//! a flat string map, the same shape a browser's `localStorage` offers.
//!
//! - [`MemoryStore`]: process-local map, shared between clones
//! - [`FileStore`]: JSON file on disk, rewritten on every mutation

mod file;

pub use file::FileStore;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::Result;

/// String key/value storage with `localStorage` semantics.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write().remove(key);
        Ok(())
    }
}
