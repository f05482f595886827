use std::collections::HashMap;

use parking_lot::RwLock;

use super::{KeyValueStore, StoreError, WriteBatch};

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry.
    #[must_use]
    pub fn entries(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        batch.apply_to(&mut self.entries.write());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_values() {
        let store = MemoryStore::new();
        store
            .apply(WriteBatch::new().set("access_token", "tok"))
            .unwrap();
        assert_eq!(store.get("access_token").as_deref(), Some("tok"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let store = MemoryStore::new();
        store.apply(WriteBatch::new()).unwrap();
        assert!(store.entries().is_empty());
    }
}
