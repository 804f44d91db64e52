use crate::errors::NestResult;
use crate::store::{NestStore, WriteBatch};

/// Staging buffer of writes across any number of maps.
///
/// Reads through the transaction see its own staged writes first and the
/// committed store state otherwise. Nothing reaches the store before
/// [`commit`](Self::commit); dropping an uncommitted transaction discards it.
pub struct Transaction {
    store: NestStore,
    batch: WriteBatch,
}

impl Transaction {
    pub(crate) fn new(store: NestStore) -> Self {
        Transaction {
            store,
            batch: WriteBatch::new(),
        }
    }

    pub fn put(&mut self, map: &str, key: Vec<u8>, value: Vec<u8>) {
        self.batch.put(map, key, value);
    }

    pub fn remove(&mut self, map: &str, key: Vec<u8>) {
        self.batch.remove(map, key);
    }

    pub fn get(&self, map: &str, key: &[u8]) -> NestResult<Option<Vec<u8>>> {
        if let Some(pending) = self.batch.pending(map, key) {
            return Ok(pending.cloned());
        }
        if !self.store.has_map(map)? {
            return Ok(None);
        }
        self.store.open_map(map)?.get(key)
    }

    pub fn contains_key(&self, map: &str, key: &[u8]) -> NestResult<bool> {
        Ok(self.get(map, key)?.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn batch(&self) -> &WriteBatch {
        &self.batch
    }

    /// Hands every staged write to the store as one atomic batch.
    pub fn commit(self) -> NestResult<()> {
        if !self.batch.is_empty() {
            log::debug!("Committing transaction with {} writes", self.batch.len());
        }
        self.store.apply(self.batch)
    }

    pub fn rollback(self) {
        log::debug!("Rolling back transaction with {} writes", self.batch.len());
    }
}
