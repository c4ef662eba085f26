//! JSON-file backed store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;

use super::KeyValueStore;

/// Store persisted as a single JSON object.
///
/// The file is read once on open and rewritten (temp file + rename) after
/// every mutation, so a crash never leaves a half-written map behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard);
        persist(&self.path, &guard)
    }
}

fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|m| {
            m.remove(key);
        })
    }
}
