use crate::errors::{ErrorKind, NestError, NestResult};
use crate::store::{Entry, NestMapProvider};
use crossbeam_skiplist::SkipMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An ordered map held entirely in memory.
#[derive(Clone)]
pub struct InMemoryMap {
    inner: Arc<InMemoryMapInner>,
}

impl InMemoryMap {
    pub fn new(name: &str) -> Self {
        InMemoryMap {
            inner: Arc::new(InMemoryMapInner::new(name)),
        }
    }

    pub(crate) fn apply(&self, key: &[u8], value: Option<&Vec<u8>>) -> NestResult<()> {
        self.inner.check_opened()?;
        match value {
            Some(value) => {
                self.inner.backing_map.insert(key.to_vec(), value.clone());
            }
            None => {
                self.inner.backing_map.remove(key);
            }
        }
        Ok(())
    }
}

impl NestMapProvider for InMemoryMap {
    fn get_name(&self) -> NestResult<String> {
        Ok(self.inner.name.clone())
    }

    fn contains_key(&self, key: &[u8]) -> NestResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.contains_key(key))
    }

    fn get(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> NestResult<()> {
        self.inner.check_opened()?;
        self.inner.backing_map.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.remove(key).map(|entry| entry.value().clone()))
    }

    fn range(&self, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> NestResult<Vec<Entry>> {
        self.inner.check_opened()?;
        Ok(self
            .inner
            .backing_map
            .range((lower, upper))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn first_key(&self) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.front().map(|entry| entry.key().clone()))
    }

    fn last_key(&self) -> NestResult<Option<Vec<u8>>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.back().map(|entry| entry.key().clone()))
    }

    fn size(&self) -> NestResult<u64> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.len() as u64)
    }

    fn clear(&self) -> NestResult<()> {
        self.inner.check_opened()?;
        self.inner.backing_map.clear();
        Ok(())
    }

    fn is_closed(&self) -> NestResult<bool> {
        Ok(self.inner.closed.load(Ordering::Relaxed))
    }

    fn close(&self) -> NestResult<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct InMemoryMapInner {
    backing_map: SkipMap<Vec<u8>, Vec<u8>>,
    closed: AtomicBool,
    name: String,
}

impl InMemoryMapInner {
    fn new(name: &str) -> InMemoryMapInner {
        InMemoryMapInner {
            backing_map: SkipMap::new(),
            closed: AtomicBool::from(false),
            name: name.to_string(),
        }
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> InMemoryMap {
        let map = InMemoryMap::new("test");
        for key in [5u8, 1, 3, 9, 7] {
            map.put(vec![key], vec![key * 10]).unwrap();
        }
        map
    }

    #[test]
    fn basic_operations() {
        let map = filled();
        assert_eq!(map.get_name().unwrap(), "test");
        assert_eq!(map.get(&[3]).unwrap(), Some(vec![30]));
        assert!(map.contains_key(&[9]).unwrap());
        assert_eq!(map.size().unwrap(), 5);
        assert_eq!(map.remove(&[9]).unwrap(), Some(vec![90]));
        assert_eq!(map.remove(&[9]).unwrap(), None);
        assert_eq!(map.size().unwrap(), 4);
    }

    #[test]
    fn keys_stay_ordered() {
        let map = filled();
        let keys: Vec<Vec<u8>> = map.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![1], vec![3], vec![5], vec![7], vec![9]]);
        assert_eq!(map.first_key().unwrap(), Some(vec![1]));
        assert_eq!(map.last_key().unwrap(), Some(vec![9]));
    }

    #[test]
    fn range_respects_bounds() {
        let map = filled();
        let entries = map
            .range(Bound::Included(vec![3]), Bound::Excluded(vec![7]))
            .unwrap();
        assert_eq!(entries, vec![(vec![3], vec![30]), (vec![5], vec![50])]);

        let entries = map.range(Bound::Excluded(vec![7]), Bound::Unbounded).unwrap();
        assert_eq!(entries, vec![(vec![9], vec![90])]);
    }

    #[test]
    fn closed_map_rejects_access() {
        let map = filled();
        map.close().unwrap();
        assert!(map.is_closed().unwrap());
        let err = map.get(&[1]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
    }

    #[test]
    fn clear_empties_map() {
        let map = filled();
        map.clear().unwrap();
        assert!(map.is_empty().unwrap());
        assert_eq!(map.first_key().unwrap(), None);
    }
}
