use crate::collection::{CollectionFactory, NestCollection};
use crate::common::SYSTEM_NAME_PREFIX;
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::mapper::{Convertible, NestMapper};
use crate::nest_builder::NestBuilder;
use crate::nest_config::NestConfig;
use crate::repository::{repository_name, ObjectRepository};
use crate::store::NestStore;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An open database.
///
/// Handles are cheap to clone and share one store. The store is committed and
/// closed by [`close`](Self::close), or when the last handle is dropped.
///
/// # Examples
///
/// ```rust
/// use nestdb::doc;
/// use nestdb::index::{IndexKind, IndexLookup};
/// use nestdb::nest::Nest;
///
/// let db = Nest::builder().open_or_create().unwrap();
/// let employees = db.collection("employees").unwrap();
/// employees.create_index("literature.ratings", IndexKind::NonUnique).unwrap();
///
/// let id = employees
///     .insert(doc! { empId: 1, literature: { text: "x", ratings: 5 } })
///     .unwrap();
/// let hits = employees
///     .query_index("literature.ratings", &IndexLookup::eq(5))
///     .unwrap();
/// assert_eq!(hits, vec![id]);
/// db.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Nest {
    inner: Arc<NestInner>,
}

impl Nest {
    pub fn builder() -> NestBuilder {
        NestBuilder::new()
    }

    pub(crate) fn open(config: NestConfig) -> NestResult<Nest> {
        let store = config.initialize()?;
        let collections = CollectionFactory::new(store.clone(), config.tokenizer()?);
        let mapper = config.mapper()?;
        Ok(Nest {
            inner: Arc::new(NestInner {
                config,
                store,
                mapper,
                collections,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Opens the collection `name`, creating it if needed.
    pub fn collection(&self, name: &str) -> NestResult<NestCollection> {
        self.inner.check_opened()?;
        self.inner.collections.get_collection(name)
    }

    /// Opens the repository of `T`, stored in a collection named after the type.
    pub fn repository<T: Convertible>(&self) -> NestResult<ObjectRepository<T>> {
        self.inner.repository::<T>(None)
    }

    /// Opens a repository of `T` qualified by `key`, separate from the
    /// unkeyed one and from other keys.
    pub fn keyed_repository<T: Convertible>(&self, key: &str) -> NestResult<ObjectRepository<T>> {
        self.inner.repository::<T>(Some(key))
    }

    pub fn destroy_repository<T: Convertible>(&self) -> NestResult<()> {
        self.destroy_collection(&repository_name::<T>(None))
    }

    pub fn has_collection(&self, name: &str) -> NestResult<bool> {
        self.inner.check_opened()?;
        if name.starts_with(SYSTEM_NAME_PREFIX) {
            return Ok(false);
        }
        self.inner.store.has_map(name)
    }

    /// Names of every user collection, repositories included. System maps are
    /// not listed.
    pub fn list_collection_names(&self) -> NestResult<BTreeSet<String>> {
        self.inner.check_opened()?;
        Ok(self
            .inner
            .store
            .map_names()?
            .into_iter()
            .filter(|name| !name.starts_with(SYSTEM_NAME_PREFIX))
            .collect())
    }

    /// Removes a collection with all of its documents and indices.
    pub fn destroy_collection(&self, name: &str) -> NestResult<()> {
        self.inner.check_opened()?;
        self.inner.collections.destroy_collection(name)
    }

    /// Flushes committed writes to durable media.
    pub fn commit(&self) -> NestResult<()> {
        self.inner.check_opened()?;
        self.inner.store.commit()
    }

    /// Commits and closes the store. Handles are unusable afterwards.
    pub fn close(&self) -> NestResult<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> NestResult<bool> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Ok(true);
        }
        self.inner.store.is_closed()
    }

    pub fn config(&self) -> NestConfig {
        self.inner.config.clone()
    }

    pub fn mapper(&self) -> NestMapper {
        self.inner.mapper.clone()
    }

    pub fn store(&self) -> NestStore {
        self.inner.store.clone()
    }
}

impl std::fmt::Debug for Nest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nest")
            .field("store", &self.inner.store)
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

struct NestInner {
    config: NestConfig,
    store: NestStore,
    mapper: NestMapper,
    collections: CollectionFactory,
    closed: AtomicBool,
}

impl NestInner {
    fn check_opened(&self) -> NestResult<()> {
        if self.closed.load(Ordering::Acquire) || self.store.is_closed()? {
            log::error!("Database is closed");
            return Err(NestError::new(
                "Database is closed. Reopen it to continue",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn repository<T: Convertible>(&self, key: Option<&str>) -> NestResult<ObjectRepository<T>> {
        self.check_opened()?;
        let collection = self.collections.get_collection(&repository_name::<T>(key))?;
        Ok(ObjectRepository::new(collection, self.mapper.clone()))
    }

    fn close(&self) -> NestResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            log::warn!("Database is already closed");
            return Ok(());
        }

        self.collections.clear();
        // a failed store is released without committing
        let committed = match self.store.is_failed() {
            true => Ok(()),
            false => self.store.commit(),
        };
        self.store.close()?;
        log::info!("Database closed");
        committed
    }
}

impl Drop for NestInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.close() {
                log::error!("Failed to close database on drop: {}", e);
            }
        }
    }
}
