use crate::collection::{Document, NestId};
use crate::common::key_codec::{
    decode_id, encode_absent, encode_id, encode_value, is_absent_key, is_null_key, type_span,
};
use crate::common::serializer::{decode, encode};
use crate::common::{atomic, Atomic, FieldPath, ReadExecutor, Value, WriteExecutor, CATALOG_MAP_NAME, NAME_SEPARATOR};
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::index::text::Tokenizer;
use crate::index::{catalog_prefix, index_map_prefix, IndexDescriptor, IndexKind, IndexLookup};
use crate::store::{prefix_upper_bound, NestStore, Transaction};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

const ID_WIDTH: usize = 8;

#[derive(Clone)]
struct IndexedPath {
    descriptor: IndexDescriptor,
    path: FieldPath,
}

/// Keeps the indices of one collection consistent with its documents.
///
/// Index entries map an encoded key to the ids of the documents producing it,
/// in insertion order. A document missing the indexed field is filed under the
/// absent marker, so "field is missing" stays answerable from the index.
///
/// Document writes stage their index changes into the caller's
/// [`Transaction`]; the collection commits document and index changes together.
#[derive(Clone)]
pub(crate) struct IndexManager {
    inner: Arc<IndexManagerInner>,
}

impl IndexManager {
    pub fn new(collection: &str, store: NestStore, tokenizer: Tokenizer) -> NestResult<Self> {
        let inner = IndexManagerInner {
            collection: collection.to_string(),
            store,
            tokenizer,
            indices: atomic(BTreeMap::new()),
        };
        inner.load_catalog()?;
        Ok(IndexManager {
            inner: Arc::new(inner),
        })
    }

    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.inner
            .indices
            .read_with(|it| it.values().map(|i| i.descriptor.clone()).collect())
    }

    pub fn has_index(&self, path: &str) -> bool {
        self.inner.indices.read_with(|it| it.contains_key(path))
    }

    pub fn find(&self, path: &str) -> Option<IndexDescriptor> {
        self.inner
            .indices
            .read_with(|it| it.get(path).map(|i| i.descriptor.clone()))
    }

    pub fn create_index(&self, path: &str, kind: IndexKind) -> NestResult<IndexDescriptor> {
        self.inner.create_index(path, kind)
    }

    pub fn drop_index(&self, path: &str) -> NestResult<()> {
        self.inner.drop_index(path)
    }

    pub fn drop_all(&self) -> NestResult<()> {
        for descriptor in self.descriptors() {
            self.inner.drop_index(descriptor.path())?;
        }
        Ok(())
    }

    pub fn on_insert(&self, tx: &mut Transaction, id: &NestId, document: &Document) -> NestResult<()> {
        self.inner.on_change(tx, id, None, Some(document))
    }

    pub fn on_update(
        &self,
        tx: &mut Transaction,
        id: &NestId,
        old: &Document,
        new: &Document,
    ) -> NestResult<()> {
        self.inner.on_change(tx, id, Some(old), Some(new))
    }

    pub fn on_remove(&self, tx: &mut Transaction, id: &NestId, document: &Document) -> NestResult<()> {
        self.inner.on_change(tx, id, Some(document), None)
    }

    /// Stages removal of every entry of every index.
    pub fn stage_clear(&self, tx: &mut Transaction) -> NestResult<()> {
        for descriptor in self.descriptors() {
            let map_name = descriptor.map_name();
            if !self.inner.store.has_map(&map_name)? {
                continue;
            }
            for (key, _) in self.inner.store.open_map(&map_name)?.entries()? {
                tx.remove(&map_name, key);
            }
        }
        Ok(())
    }

    pub fn query(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<NestId>> {
        self.inner.query(path, lookup)
    }
}

struct IndexManagerInner {
    collection: String,
    store: NestStore,
    tokenizer: Tokenizer,
    indices: Atomic<BTreeMap<String, IndexedPath>>,
}

impl IndexManagerInner {
    fn load_catalog(&self) -> NestResult<()> {
        let catalog = self.store.open_map(CATALOG_MAP_NAME)?;
        let prefix = catalog_prefix(&self.collection);
        let entries = catalog.range(Bound::Included(prefix.clone()), prefix_upper_bound(&prefix))?;

        let mut indices = BTreeMap::new();
        for (_, bytes) in entries {
            let descriptor: IndexDescriptor = decode(&bytes)?;
            let path = FieldPath::parse(descriptor.path())?;
            indices.insert(descriptor.path().to_string(), IndexedPath { descriptor, path });
        }
        log::debug!(
            "Loaded {} index definitions for collection {}",
            indices.len(),
            self.collection
        );
        self.indices.write_with(|it| *it = indices);
        self.remove_orphans()
    }

    /// Removes index maps left behind by an index build or drop that never
    /// completed.
    fn remove_orphans(&self) -> NestResult<()> {
        if self.store.is_failed() {
            return Ok(());
        }
        let prefix = index_map_prefix(&self.collection);
        let known: Vec<String> = self
            .indices
            .read_with(|it| it.values().map(|i| i.descriptor.map_name()).collect());

        for name in self.store.map_names()? {
            if name.starts_with(&prefix) && !known.contains(&name) {
                log::warn!("Removing orphaned index map {}", name);
                self.store.remove_map(&name)?;
            }
        }
        Ok(())
    }

    fn create_index(&self, path: &str, kind: IndexKind) -> NestResult<IndexDescriptor> {
        let field_path = FieldPath::parse(path)?;
        if path.contains(NAME_SEPARATOR) {
            log::error!("Index path {} contains the reserved separator {}", path, NAME_SEPARATOR);
            return Err(NestError::new(
                &format!("Index path {} contains the reserved separator {}", path, NAME_SEPARATOR),
                ErrorKind::InvalidFieldName,
            ));
        }

        if let Some(existing) = self.indices.read_with(|it| it.get(path).map(|i| i.descriptor.clone())) {
            log::error!("Index already exists on {}.{}: {}", self.collection, path, existing);
            return Err(NestError::new(
                &format!("An index already exists on {}.{}", self.collection, path),
                ErrorKind::IndexAlreadyExists,
            ));
        }

        let descriptor = IndexDescriptor::new(&self.collection, path, kind);
        let map_name = descriptor.map_name();
        if self.store.has_map(&map_name)? {
            log::warn!("Removing stale index map {} before rebuilding", map_name);
            self.store.remove_map(&map_name)?;
        }

        let indexed = IndexedPath {
            descriptor: descriptor.clone(),
            path: field_path,
        };

        let mut tx = self.store.begin();
        tx.put(CATALOG_MAP_NAME, descriptor.catalog_key(), encode(&descriptor)?);

        if self.store.has_map(&self.collection)? {
            let documents = self.store.open_map(&self.collection)?.entries()?;
            for (key, bytes) in documents {
                let id = decode_id(&key)?;
                let document: Document = decode(&bytes)?;
                let keys = self.index_keys(&indexed, &document)?;
                self.add_entries(&mut tx, &indexed, &id, &keys)?;
            }
        }

        tx.commit()?;
        log::info!("Created {}", descriptor);
        self.indices
            .write_with(|it| it.insert(path.to_string(), indexed));
        Ok(descriptor)
    }

    fn drop_index(&self, path: &str) -> NestResult<()> {
        let Some(indexed) = self.indices.read_with(|it| it.get(path).cloned()) else {
            log::error!("No index found on {}.{}", self.collection, path);
            return Err(NestError::new(
                &format!("No index found on {}.{}", self.collection, path),
                ErrorKind::IndexNotFound,
            ));
        };

        let mut tx = self.store.begin();
        tx.remove(CATALOG_MAP_NAME, indexed.descriptor.catalog_key());
        tx.commit()?;
        self.indices.write_with(|it| it.remove(path));

        let map_name = indexed.descriptor.map_name();
        if self.store.has_map(&map_name)? {
            self.store.remove_map(&map_name)?;
        }
        log::info!("Dropped {}", indexed.descriptor);
        Ok(())
    }

    fn on_change(
        &self,
        tx: &mut Transaction,
        id: &NestId,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> NestResult<()> {
        let indices: Vec<IndexedPath> = self.indices.read_with(|it| it.values().cloned().collect());
        for indexed in indices.iter() {
            let old_keys = match old {
                Some(doc) => self.index_keys(indexed, doc)?,
                None => Vec::new(),
            };
            let new_keys = match new {
                Some(doc) => self.index_keys(indexed, doc)?,
                None => Vec::new(),
            };
            if old_keys == new_keys {
                continue;
            }

            let stale: Vec<Vec<u8>> = old_keys
                .iter()
                .filter(|key| !new_keys.contains(key))
                .cloned()
                .collect();
            let fresh: Vec<Vec<u8>> = new_keys
                .iter()
                .filter(|key| !old_keys.contains(key))
                .cloned()
                .collect();

            self.remove_entries(tx, indexed, id, &stale)?;
            self.add_entries(tx, indexed, id, &fresh)?;
        }
        Ok(())
    }

    /// Keys a document produces for one index, without duplicates.
    fn index_keys(&self, indexed: &IndexedPath, document: &Document) -> NestResult<Vec<Vec<u8>>> {
        let value = match document.resolve(&indexed.path) {
            Some(value) => value,
            None => return Ok(vec![encode_absent()]),
        };

        let keys = match indexed.descriptor.kind() {
            IndexKind::FullText => self.text_keys(indexed, &value)?,
            _ => match value {
                Value::Array(items) => items.iter().map(encode_value).collect(),
                other => vec![encode_value(&other)],
            },
        };
        Ok(keys.into_iter().unique().collect())
    }

    fn text_keys(&self, indexed: &IndexedPath, value: &Value) -> NestResult<Vec<Vec<u8>>> {
        let words = |text: &str| -> Vec<Vec<u8>> {
            self.tokenizer
                .tokenize(text)
                .into_iter()
                .map(|token| encode_value(&Value::String(token)))
                .collect()
        };

        match value {
            Value::Null => Ok(vec![encode_value(&Value::Null)]),
            Value::String(text) => Ok(words(text)),
            Value::Array(items) => {
                let mut keys = Vec::new();
                for item in items {
                    match item {
                        Value::String(text) => keys.extend(words(text)),
                        other => return Err(self.not_text(indexed, other)),
                    }
                }
                Ok(keys)
            }
            other => Err(self.not_text(indexed, other)),
        }
    }

    fn not_text(&self, indexed: &IndexedPath, value: &Value) -> NestError {
        log::error!(
            "Full-text index on {}.{} cannot index a {} value",
            self.collection,
            indexed.descriptor.path(),
            value.type_name()
        );
        NestError::new(
            &format!(
                "Full-text index on {}.{} only accepts strings, found {}",
                self.collection,
                indexed.descriptor.path(),
                value.type_name()
            ),
            ErrorKind::IndexingError,
        )
    }

    fn add_entries(
        &self,
        tx: &mut Transaction,
        indexed: &IndexedPath,
        id: &NestId,
        keys: &[Vec<u8>],
    ) -> NestResult<()> {
        let map_name = indexed.descriptor.map_name();
        for key in keys {
            let mut ids = match tx.get(&map_name, key)? {
                Some(bytes) => decode_ids(&bytes)?,
                None => Vec::new(),
            };
            if ids.contains(id) {
                continue;
            }

            let checked = !is_absent_key(key) && !is_null_key(key);
            if indexed.descriptor.kind() == IndexKind::Unique && checked && !ids.is_empty() {
                log::error!(
                    "Unique constraint violated on {}.{} by document {}",
                    self.collection,
                    indexed.descriptor.path(),
                    id
                );
                return Err(NestError::new(
                    &format!(
                        "Unique index on {}.{} already holds this value for document {}",
                        self.collection,
                        indexed.descriptor.path(),
                        ids[0]
                    ),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }

            ids.push(*id);
            tx.put(&map_name, key.clone(), encode_ids(&ids));
        }
        Ok(())
    }

    fn remove_entries(
        &self,
        tx: &mut Transaction,
        indexed: &IndexedPath,
        id: &NestId,
        keys: &[Vec<u8>],
    ) -> NestResult<()> {
        let map_name = indexed.descriptor.map_name();
        for key in keys {
            let Some(bytes) = tx.get(&map_name, key)? else {
                continue;
            };
            let mut ids = decode_ids(&bytes)?;
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                tx.remove(&map_name, key.clone());
            } else {
                tx.put(&map_name, key.clone(), encode_ids(&ids));
            }
        }
        Ok(())
    }

    fn query(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<NestId>> {
        let Some(indexed) = self.indices.read_with(|it| it.get(path).cloned()) else {
            log::error!("No index found on {}.{}", self.collection, path);
            return Err(NestError::new(
                &format!("No index found on {}.{}", self.collection, path),
                ErrorKind::IndexNotFound,
            ));
        };

        let full_text = indexed.descriptor.kind() == IndexKind::FullText;
        let keys: Vec<Vec<u8>> = match lookup {
            IndexLookup::Absent => vec![encode_absent()],
            IndexLookup::Eq(Value::String(text)) if full_text => self.text_query_keys(text),
            IndexLookup::Eq(value) => vec![encode_value(value)],
            IndexLookup::Text(text) if full_text => self.text_query_keys(text),
            IndexLookup::Text(_) => {
                log::error!("Text lookup on {} which is not a full-text index", indexed.descriptor);
                return Err(NestError::new(
                    &format!("Text lookup needs a full-text index, {} is {}", path, indexed.descriptor.kind()),
                    ErrorKind::InvalidOperation,
                ));
            }
            IndexLookup::Range { .. } if full_text => {
                log::error!("Range lookup on full-text index {}", indexed.descriptor);
                return Err(NestError::new(
                    &format!("Range lookups are not supported on full-text index {}", path),
                    ErrorKind::InvalidOperation,
                ));
            }
            IndexLookup::Range { lower, upper } => {
                return self.range_query(&indexed, lower, upper);
            }
        };

        let map_name = indexed.descriptor.map_name();
        if !self.store.has_map(&map_name)? {
            return Ok(Vec::new());
        }
        let map = self.store.open_map(&map_name)?;
        let mut result = Vec::new();
        for key in keys {
            if let Some(bytes) = map.get(&key)? {
                result.extend(decode_ids(&bytes)?);
            }
        }
        Ok(result.into_iter().unique().collect())
    }

    fn text_query_keys(&self, text: &str) -> Vec<Vec<u8>> {
        self.tokenizer
            .tokenize(text)
            .into_iter()
            .map(|token| encode_value(&Value::String(token)))
            .collect()
    }

    fn range_query(
        &self,
        indexed: &IndexedPath,
        lower: &Bound<Value>,
        upper: &Bound<Value>,
    ) -> NestResult<Vec<NestId>> {
        let map_name = indexed.descriptor.map_name();
        if !self.store.has_map(&map_name)? {
            return Ok(Vec::new());
        }

        // an open end stays within the type of the bounded end
        let (lower, upper) = match (lower, upper) {
            (Bound::Unbounded, Bound::Unbounded) => (Bound::Excluded(encode_absent()), Bound::Unbounded),
            (Bound::Unbounded, Bound::Included(v) | Bound::Excluded(v)) => {
                (Bound::Included(type_span(v).0), encode_bound(upper))
            }
            (Bound::Included(v) | Bound::Excluded(v), Bound::Unbounded) => {
                (encode_bound(lower), Bound::Excluded(type_span(v).1))
            }
            _ => (encode_bound(lower), encode_bound(upper)),
        };
        if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) = (&lower, &upper) {
            let both_included = matches!((&lower, &upper), (Bound::Included(_), Bound::Included(_)));
            if l > u || (l == u && !both_included) {
                return Ok(Vec::new());
            }
        }

        let map = self.store.open_map(&map_name)?;
        let mut result = Vec::new();
        for (_, bytes) in map.range(lower, upper)? {
            result.extend(decode_ids(&bytes)?);
        }
        Ok(result.into_iter().unique().collect())
    }
}

fn encode_bound(bound: &Bound<Value>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(v) => Bound::Included(encode_value(v)),
        Bound::Excluded(v) => Bound::Excluded(encode_value(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn encode_ids(ids: &[NestId]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ids.len() * ID_WIDTH);
    for id in ids {
        bytes.extend(encode_id(id));
    }
    bytes
}

fn decode_ids(bytes: &[u8]) -> NestResult<Vec<NestId>> {
    if bytes.len() % ID_WIDTH != 0 {
        log::error!("Corrupt index entry of length {}", bytes.len());
        return Err(NestError::new(
            &format!("Corrupt index entry of length {}", bytes.len()),
            ErrorKind::EncodingError,
        ));
    }
    bytes.chunks(ID_WIDTH).map(decode_id).collect()
}
