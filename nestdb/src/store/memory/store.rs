use super::InMemoryMap;
use crate::common::NEST_VERSION;
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::store::{NestMap, NestMapProvider, NestStoreProvider, WriteBatch};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ephemeral engine: one skip list per map, gone when the process exits.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NestStoreProvider for InMemoryStore {
    fn open_or_create(&self) -> NestResult<()> {
        self.inner.closed.store(false, Ordering::Relaxed);
        log::debug!("Opened in-memory store");
        Ok(())
    }

    fn is_closed(&self) -> NestResult<bool> {
        Ok(self.inner.closed.load(Ordering::Relaxed))
    }

    fn commit(&self) -> NestResult<()> {
        self.inner.check_opened()
    }

    fn close(&self) -> NestResult<()> {
        self.inner.close()
    }

    fn has_map(&self, name: &str) -> NestResult<bool> {
        Ok(self.inner.map_registry.contains_key(name))
    }

    fn open_map(&self, name: &str) -> NestResult<NestMap> {
        let map = self.inner.open_map(name)?;
        Ok(NestMap::new(map))
    }

    fn remove_map(&self, name: &str) -> NestResult<()> {
        self.inner.check_opened()?;
        if let Some((_, map)) = self.inner.map_registry.remove(name) {
            map.close()?;
        }
        Ok(())
    }

    fn map_names(&self) -> NestResult<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .map_registry
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn apply(&self, batch: WriteBatch) -> NestResult<()> {
        self.inner.apply(batch)
    }

    fn store_version(&self) -> NestResult<String> {
        Ok(format!("InMemory/{}", NEST_VERSION))
    }
}

struct InMemoryStoreInner {
    closed: AtomicBool,
    map_registry: DashMap<String, InMemoryMap>,
    write_lock: Mutex<()>,
}

impl InMemoryStoreInner {
    fn new() -> InMemoryStoreInner {
        InMemoryStoreInner {
            closed: AtomicBool::from(true),
            map_registry: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    fn check_opened(&self) -> NestResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is closed");
            return Err(NestError::new(
                "In-memory store is closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn open_map(&self, name: &str) -> NestResult<InMemoryMap> {
        self.check_opened()?;
        let map = self
            .map_registry
            .entry(name.to_string())
            .or_insert_with(|| InMemoryMap::new(name))
            .clone();
        Ok(map)
    }

    fn apply(&self, batch: WriteBatch) -> NestResult<()> {
        self.check_opened()?;
        let _guard = self.write_lock.lock();
        for (name, operations) in batch.iter() {
            let map = self.open_map(name)?;
            for (key, value) in operations.iter() {
                map.apply(key, value.as_ref())?;
            }
        }
        Ok(())
    }

    fn close(&self) -> NestResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            log::warn!("In-memory store is already closed");
        }
        Ok(())
    }
}
