use super::snowflake::SnowflakeIdGenerator;
use super::NestCollection;
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::NestResult;
use crate::index::text::Tokenizer;
use crate::store::NestStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Hands out one shared [`NestCollection`] per name, so every handle of a
/// collection serializes its writes on the same lock.
#[derive(Clone)]
pub(crate) struct CollectionFactory {
    inner: Arc<CollectionFactoryInner>,
}

struct CollectionFactoryInner {
    collection_map: Atomic<HashMap<String, NestCollection>>,
    store: NestStore,
    tokenizer: Tokenizer,
    id_generator: Arc<SnowflakeIdGenerator>,
}

impl CollectionFactory {
    pub fn new(store: NestStore, tokenizer: Tokenizer) -> Self {
        CollectionFactory {
            inner: Arc::new(CollectionFactoryInner {
                collection_map: atomic(HashMap::new()),
                store,
                tokenizer,
                id_generator: Arc::new(SnowflakeIdGenerator::new()),
            }),
        }
    }

    pub fn get_collection(&self, name: &str) -> NestResult<NestCollection> {
        let cached = self
            .inner
            .collection_map
            .read_with(|it| it.get(name).cloned());
        if let Some(collection) = cached {
            if !collection.is_dropped() {
                return Ok(collection);
            }
        }

        // at most one open handle per name
        let mut collections = self.inner.collection_map.write();
        if let Some(collection) = collections.get(name) {
            if !collection.is_dropped() {
                return Ok(collection.clone());
            }
        }

        let collection = NestCollection::open(
            name,
            self.inner.store.clone(),
            self.inner.tokenizer.clone(),
            self.inner.id_generator.clone(),
        )?;
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    pub fn destroy_collection(&self, name: &str) -> NestResult<()> {
        let collection = self.get_collection(name)?;
        collection.drop()?;
        self.inner.collection_map.write_with(|it| it.remove(name));
        Ok(())
    }

    pub fn clear(&self) {
        self.inner.collection_map.write_with(|it| it.clear());
    }
}
