use crate::errors::NestResult;
use std::ops::{Bound, Deref};
use std::sync::Arc;

/// A raw key-value pair read from a map.
pub type Entry = (Vec<u8>, Vec<u8>);

/// One ordered, byte-keyed map of a store.
///
/// Keys are ordered by unsigned byte comparison. Direct writes through this
/// trait bypass the store's transaction boundary; the database itself writes
/// through [`Transaction`](crate::store::Transaction) only.
pub trait NestMapProvider: Send + Sync {
    fn get_name(&self) -> NestResult<String>;

    fn contains_key(&self, key: &[u8]) -> NestResult<bool>;

    fn get(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>>;

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> NestResult<()>;

    fn remove(&self, key: &[u8]) -> NestResult<Option<Vec<u8>>>;

    /// Entries whose keys fall between the bounds, in key order.
    fn range(&self, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> NestResult<Vec<Entry>>;

    fn entries(&self) -> NestResult<Vec<Entry>> {
        self.range(Bound::Unbounded, Bound::Unbounded)
    }

    fn first_key(&self) -> NestResult<Option<Vec<u8>>>;

    fn last_key(&self) -> NestResult<Option<Vec<u8>>>;

    fn size(&self) -> NestResult<u64>;

    fn is_empty(&self) -> NestResult<bool> {
        Ok(self.size()? == 0)
    }

    fn clear(&self) -> NestResult<()>;

    fn is_closed(&self) -> NestResult<bool>;

    fn close(&self) -> NestResult<()>;
}

#[derive(Clone)]
pub struct NestMap {
    inner: Arc<dyn NestMapProvider>,
}

impl NestMap {
    pub fn new<T: NestMapProvider + 'static>(inner: T) -> Self {
        NestMap { inner: Arc::new(inner) }
    }
}

impl Deref for NestMap {
    type Target = Arc<dyn NestMapProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for NestMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestMap")
            .field("name", &self.inner.get_name().ok())
            .finish()
    }
}

/// Prefix scan helper: the exclusive upper bound of all keys starting with `prefix`.
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Bound<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Bound::Excluded(upper);
        }
    }
    Bound::Unbounded
}
