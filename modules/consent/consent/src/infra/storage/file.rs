use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::ports::LocalStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a consent store: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value store kept as one JSON object on disk.
///
/// Entries are cached in memory; every mutation rewrites the file through a
/// sibling temp file and a rename.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    /// Open the store at `path`, creating it on first write.
    ///
    /// # Errors
    /// Returns `StoreError` when the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened consent store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        f(&mut entries);
        self.flush(&entries)?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear_all(&self) -> anyhow::Result<()> {
        self.mutate(BTreeMap::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("consent.json");

        let store = FileLocalStore::open(&path).unwrap();
        store.set("sp.auth_id", "user-1").unwrap();
        store.set("sp.local_state", r#"{"gdpr":{}}"#).unwrap();
        store.remove("sp.auth_id").unwrap();
        drop(store);

        let reopened = FileLocalStore::open(&path).unwrap();
        assert!(reopened.get("sp.auth_id").unwrap().is_none());
        assert_eq!(
            reopened.get("sp.local_state").unwrap().as_deref(),
            Some(r#"{"gdpr":{}}"#)
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn clear_all_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consent.json");
        let store = FileLocalStore::open(&path).unwrap();
        store.set("k", "v").unwrap();

        store.clear_all().unwrap();

        let reopened = FileLocalStore::open(&path).unwrap();
        assert!(reopened.get("k").unwrap().is_none());
    }

    #[test]
    fn garbage_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consent.json");
        fs::write(&path, "[1, 2").unwrap();

        let err = FileLocalStore::open(&path).unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
