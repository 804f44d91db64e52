use crate::errors::NestResult;
use crate::store::memory::InMemoryStore;
use crate::store::{NestStore, StoreModule};
use std::sync::OnceLock;

/// Store module for the in-memory engine, the default when nothing else is
/// configured. Every call hands out the same store.
#[derive(Default)]
pub struct InMemoryStoreModule {
    store: OnceLock<NestStore>,
}

impl InMemoryStoreModule {
    pub fn new() -> InMemoryStoreModule {
        InMemoryStoreModule::default()
    }
}

impl StoreModule for InMemoryStoreModule {
    fn get_store(&self) -> NestResult<NestStore> {
        Ok(self
            .store
            .get_or_init(|| NestStore::new(InMemoryStore::new()))
            .clone())
    }
}
