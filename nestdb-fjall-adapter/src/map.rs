use crate::wrapper::to_nest_error;
use fjall::{Keyspace, PartitionHandle};
use nestdb::errors::{ErrorKind, NestError, NestResult};
use nestdb::store::{Entry, NestMapProvider};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One map of a [`FjallStore`](crate::FjallStore), backed by its own fjall
/// partition.
///
/// Fjall orders keys by unsigned byte comparison, which is the order the
/// database's key codec relies on for range lookups.
#[derive(Clone)]
pub struct FjallMap {
    inner: Arc<FjallMapInner>,
}

impl FjallMap {
    pub(crate) fn new(name: &str, partition: PartitionHandle, keyspace: Keyspace) -> FjallMap {
        FjallMap {
            inner: Arc::new(FjallMapInner {
                name: name.to_string(),
                partition,
                keyspace,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn partition(&self) -> &PartitionHandle {
        &self.inner.partition
    }
}

impl NestMapProvider for FjallMap {
    fn get_name(&self) -> NestResult<String> {
        Ok(self.inner.name.clone())
    }

    fn contains_key(&self, key: &[u8]) -> NestResult<bool> {
        self.inner.check_opened()?;
        self.inner
            .partition
            .contains_key(key)
            .map_err(|e| to_nest_error(&format!("Failed to look up key in {}", self.inner.name), e))
    }

    fn get(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        match self.inner.partition.get(key) {
            Ok(value) => Ok(value.map(|slice| slice.to_vec())),
            Err(e) => Err(to_nest_error(&format!("Failed to read from {}", self.inner.name), e)),
        }
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> NestResult<()> {
        self.inner.check_opened()?;
        self.inner
            .partition
            .insert(key, value)
            .map_err(|e| to_nest_error(&format!("Failed to write to {}", self.inner.name), e))
    }

    fn remove(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        let previous = self.get(key)?;
        if previous.is_some() {
            self.inner
                .partition
                .remove(key)
                .map_err(|e| to_nest_error(&format!("Failed to remove from {}", self.inner.name), e))?;
        }
        Ok(previous)
    }

    fn range(&self, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> NestResult<Vec<Entry>> {
        self.inner.check_opened()?;
        // inverted bounds select nothing
        if is_inverted(&lower, &upper) {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for item in self.inner.partition.range((lower, upper)) {
            match item {
                Ok((key, value)) => entries.push((key.to_vec(), value.to_vec())),
                Err(e) => {
                    return Err(to_nest_error(&format!("Failed to scan {}", self.inner.name), e));
                }
            }
        }
        Ok(entries)
    }

    fn first_key(&self) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        match self.inner.partition.first_key_value() {
            Ok(entry) => Ok(entry.map(|(key, _)| key.to_vec())),
            Err(e) => Err(to_nest_error(&format!("Failed to read first key of {}", self.inner.name), e)),
        }
    }

    fn last_key(&self) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        match self.inner.partition.last_key_value() {
            Ok(entry) => Ok(entry.map(|(key, _)| key.to_vec())),
            Err(e) => Err(to_nest_error(&format!("Failed to read last key of {}", self.inner.name), e)),
        }
    }

    fn size(&self) -> NestResult<u64> {
        self.inner.check_opened()?;
        match self.inner.partition.len() {
            Ok(len) => Ok(len as u64),
            Err(e) => Err(to_nest_error(&format!("Failed to count {}", self.inner.name), e)),
        }
    }

    fn is_empty(&self) -> NestResult<bool> {
        self.inner.check_opened()?;
        self.inner
            .partition
            .is_empty()
            .map_err(|e| to_nest_error(&format!("Failed to inspect {}", self.inner.name), e))
    }

    fn clear(&self) -> NestResult<()> {
        self.inner.check_opened()?;
        let entries = self.entries()?;
        if entries.is_empty() {
            return Ok(());
        }

        let mut batch = self.inner.keyspace.batch();
        for (key, _) in entries {
            batch.remove(&self.inner.partition, key);
        }
        batch
            .commit()
            .map_err(|e| to_nest_error(&format!("Failed to clear {}", self.inner.name), e))
    }

    fn is_closed(&self) -> NestResult<bool> {
        Ok(self.inner.closed.load(Ordering::Relaxed))
    }

    fn close(&self) -> NestResult<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct FjallMapInner {
    name: String,
    partition: PartitionHandle,
    keyspace: Keyspace,
    closed: AtomicBool,
}

impl FjallMapInner {
    fn check_opened(&self) -> NestResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Map {} is closed", self.name);
            return Err(NestError::new(
                &format!("Map {} is closed", self.name),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}

fn is_inverted(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    use Bound::{Excluded, Included};
    match (lower, upper) {
        (Included(l), Included(u)) => l > u,
        (Included(l), Excluded(u)) | (Excluded(l), Included(u)) | (Excluded(l), Excluded(u)) => {
            l >= u
        }
        _ => false,
    }
}
