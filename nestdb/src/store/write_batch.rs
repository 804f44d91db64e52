use std::collections::BTreeMap;

/// Pending writes grouped by map name. `None` marks a removal.
///
/// A store applies a batch as one unit: either every write becomes visible and
/// durable, or none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    maps: BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn put(&mut self, map: &str, key: Vec<u8>, value: Vec<u8>) {
        self.maps.entry(map.to_string()).or_default().insert(key, Some(value));
    }

    pub fn remove(&mut self, map: &str, key: Vec<u8>) {
        self.maps.entry(map.to_string()).or_default().insert(key, None);
    }

    /// The staged state of `key`: `Some(Some(_))` for a put, `Some(None)` for a
    /// removal and `None` when the key is untouched.
    pub fn pending(&self, map: &str, key: &[u8]) -> Option<Option<&Vec<u8>>> {
        self.maps.get(map)?.get(key).map(|v| v.as_ref())
    }

    pub fn map_names(&self) -> impl Iterator<Item = &String> {
        self.maps.keys()
    }

    pub fn operations(&self, map: &str) -> impl Iterator<Item = (&Vec<u8>, &Option<Vec<u8>>)> {
        self.maps.get(map).into_iter().flat_map(|ops| ops.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<Vec<u8>, Option<Vec<u8>>>)> {
        self.maps.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.values().all(|ops| ops.is_empty())
    }

    /// Number of staged operations across all maps.
    pub fn len(&self) -> usize {
        self.maps.values().map(|ops| ops.len()).sum()
    }
}
