use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::ports::LocalStore;

/// Process-local store; nothing outlives the session.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear_all(&self) -> anyhow::Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
