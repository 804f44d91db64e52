use crate::errors::{ErrorKind, NestError, NestResult};
use crate::store::{NestMap, Transaction, WriteBatch};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A storage engine holding a set of named [`NestMap`]s.
pub trait NestStoreProvider: Send + Sync {
    fn open_or_create(&self) -> NestResult<()>;

    fn is_closed(&self) -> NestResult<bool>;

    /// Makes every applied batch durable.
    fn commit(&self) -> NestResult<()>;

    fn close(&self) -> NestResult<()>;

    fn has_map(&self, name: &str) -> NestResult<bool>;

    /// Opens the map called `name`, creating it when missing. Reopening a store
    /// yields the same logical map under the same name.
    fn open_map(&self, name: &str) -> NestResult<NestMap>;

    fn remove_map(&self, name: &str) -> NestResult<()>;

    fn map_names(&self) -> NestResult<Vec<String>>;

    /// Applies every write of `batch` atomically across maps.
    fn apply(&self, batch: WriteBatch) -> NestResult<()>;

    fn store_version(&self) -> NestResult<String>;
}

/// Shared handle to the active storage engine.
///
/// Once an engine write fails the handle refuses all further writes with
/// [`ErrorKind::StorageError`]; the store has to be reopened to recover.
#[derive(Clone)]
pub struct NestStore {
    inner: Arc<dyn NestStoreProvider>,
    failed: Arc<AtomicBool>,
}

impl NestStore {
    pub fn new<T: NestStoreProvider + 'static>(inner: T) -> Self {
        NestStore {
            inner: Arc::new(inner),
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn open_or_create(&self) -> NestResult<()> {
        self.inner.open_or_create()?;
        self.failed.store(false, Ordering::Release);
        Ok(())
    }

    pub fn is_closed(&self) -> NestResult<bool> {
        self.inner.is_closed()
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn close(&self) -> NestResult<()> {
        self.inner.close()
    }

    pub fn commit(&self) -> NestResult<()> {
        self.check_writable()?;
        self.inner.commit().map_err(|e| self.latch("commit", e))
    }

    pub fn has_map(&self, name: &str) -> NestResult<bool> {
        self.inner.has_map(name)
    }

    pub fn open_map(&self, name: &str) -> NestResult<NestMap> {
        self.inner.open_map(name)
    }

    pub fn remove_map(&self, name: &str) -> NestResult<()> {
        self.check_writable()?;
        self.inner.remove_map(name).map_err(|e| self.latch("remove map", e))
    }

    pub fn map_names(&self) -> NestResult<Vec<String>> {
        self.inner.map_names()
    }

    pub fn store_version(&self) -> NestResult<String> {
        self.inner.store_version()
    }

    /// Starts a staging buffer whose writes reach the store on commit only.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    pub fn apply(&self, batch: WriteBatch) -> NestResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.check_writable()?;
        self.inner.apply(batch).map_err(|e| self.latch("apply", e))
    }

    fn check_writable(&self) -> NestResult<()> {
        if self.inner.is_closed()? {
            log::error!("Store is already closed");
            return Err(NestError::new(
                "Store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        if self.is_failed() {
            log::error!("Store refuses writes after an earlier storage failure");
            return Err(NestError::new(
                "Store refuses writes after an earlier storage failure, reopen it to recover",
                ErrorKind::StorageError,
            ));
        }
        Ok(())
    }

    fn latch(&self, operation: &str, cause: NestError) -> NestError {
        log::error!("Storage {} failed, refusing further writes: {}", operation, cause);
        self.failed.store(true, Ordering::Release);
        NestError::new_with_cause(
            &format!("Storage {} failed", operation),
            ErrorKind::StorageError,
            cause,
        )
    }
}

impl std::fmt::Debug for NestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestStore")
            .field("version", &self.inner.store_version().ok())
            .field("closed", &self.inner.is_closed().ok())
            .field("failed", &self.is_failed())
            .finish()
    }
}
