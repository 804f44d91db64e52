use crate::collection::snowflake::SnowflakeIdGenerator;
use crate::collection::{Document, NestId};
use crate::common::key_codec::{decode_id, encode_id};
use crate::common::serializer::{decode, encode};
use crate::common::{NAME_SEPARATOR, SYSTEM_NAME_PREFIX};
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::index::text::Tokenizer;
use crate::index::{IndexDescriptor, IndexKind, IndexLookup, IndexManager};
use crate::store::{NestStore, Transaction};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named set of documents together with its indices.
///
/// Every write runs as one transaction: the document change and the changes
/// of every index are staged together and committed with a single call to the
/// store. Writes on one collection are serialized; reads run concurrently with
/// each other but never observe a write half applied.
///
/// Handles are cheap to clone and share state.
#[derive(Clone)]
pub struct NestCollection {
    inner: Arc<NestCollectionInner>,
}

impl NestCollection {
    pub(crate) fn open(
        name: &str,
        store: NestStore,
        tokenizer: Tokenizer,
        id_generator: Arc<SnowflakeIdGenerator>,
    ) -> NestResult<Self> {
        validate_collection_name(name)?;
        let indices = IndexManager::new(name, store.clone(), tokenizer)?;

        if let Some(last) = store.open_map(name)?.last_key()? {
            id_generator.advance_past(&decode_id(&last)?);
        }

        log::debug!("Opened collection {}", name);
        Ok(NestCollection {
            inner: Arc::new(NestCollectionInner {
                name: name.to_string(),
                store,
                indices,
                id_generator,
                lock: RwLock::new(()),
                dropped: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Stores a new document and returns its id.
    ///
    /// A document without `_id` gets a fresh one. A document that brings its
    /// own id fails with [`ErrorKind::UniqueConstraintViolation`] if that id
    /// is taken.
    pub fn insert(&self, document: Document) -> NestResult<NestId> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let mut tx = self.inner.store.begin();
        let id = self.inner.stage_insert(&mut tx, document)?;
        tx.commit()?;
        Ok(id)
    }

    /// Stores all documents in one transaction. Either every document is
    /// stored or none is.
    pub fn insert_many(&self, documents: Vec<Document>) -> NestResult<Vec<NestId>> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let mut tx = self.inner.store.begin();
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.inner.stage_insert(&mut tx, document)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Replaces the stored document with the same `_id`.
    ///
    /// Fails with [`ErrorKind::NotFound`] when no such document exists.
    pub fn update(&self, document: Document) -> NestResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let id = document.id()?;
        let Some(old) = self.inner.load(&id)? else {
            log::error!("Cannot update document {} in {}: not found", id, self.inner.name);
            return Err(NestError::new(
                &format!("No document with id {} in collection {}", id, self.inner.name),
                ErrorKind::NotFound,
            ));
        };

        let mut tx = self.inner.store.begin();
        self.inner.stage_update(&mut tx, &id, &old, &document)?;
        tx.commit()
    }

    /// Updates the document when its id is stored, inserts it otherwise.
    pub fn upsert(&self, document: Document) -> NestResult<NestId> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let mut tx = self.inner.store.begin();
        let existing = match document.has_id() {
            true => {
                let id = document.id()?;
                self.inner.load(&id)?.map(|old| (id, old))
            }
            false => None,
        };

        let id = match existing {
            Some((id, old)) => {
                self.inner.stage_update(&mut tx, &id, &old, &document)?;
                id
            }
            None => self.inner.stage_insert(&mut tx, document)?,
        };
        tx.commit()?;
        Ok(id)
    }

    /// Removes a document and returns it, or `None` if it was not stored.
    pub fn remove(&self, id: &NestId) -> NestResult<Option<Document>> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let Some(document) = self.inner.load(id)? else {
            return Ok(None);
        };
        let mut tx = self.inner.store.begin();
        tx.remove(&self.inner.name, encode_id(id));
        self.inner.indices.on_remove(&mut tx, id, &document)?;
        tx.commit()?;
        Ok(Some(document))
    }

    pub fn get_by_id(&self, id: &NestId) -> NestResult<Option<Document>> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;
        self.inner.load(id)
    }

    /// All documents in id order.
    pub fn find_all(&self) -> NestResult<Vec<Document>> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;

        if !self.inner.store.has_map(&self.inner.name)? {
            return Ok(Vec::new());
        }
        self.inner
            .store
            .open_map(&self.inner.name)?
            .entries()?
            .iter()
            .map(|(_, bytes)| decode::<Document>(bytes))
            .collect()
    }

    pub fn size(&self) -> NestResult<u64> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;

        if !self.inner.store.has_map(&self.inner.name)? {
            return Ok(0);
        }
        self.inner.store.open_map(&self.inner.name)?.size()
    }

    /// Defines an index and builds it from the documents already stored.
    pub fn create_index(&self, path: &str, kind: IndexKind) -> NestResult<IndexDescriptor> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;
        self.inner.indices.create_index(path, kind)
    }

    pub fn drop_index(&self, path: &str) -> NestResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;
        self.inner.indices.drop_index(path)
    }

    pub fn drop_all_indices(&self) -> NestResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;
        self.inner.indices.drop_all()
    }

    pub fn has_index(&self, path: &str) -> NestResult<bool> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;
        Ok(self.inner.indices.has_index(path))
    }

    pub fn list_indices(&self) -> NestResult<Vec<IndexDescriptor>> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;
        Ok(self.inner.indices.descriptors())
    }

    /// Ids of the documents matching `lookup` on the index at `path`.
    pub fn query_index(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<NestId>> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;
        self.inner.indices.query(path, lookup)
    }

    /// Documents matching `lookup` on the index at `path`, in index order.
    pub fn find_by_index(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<Document>> {
        let _guard = self.inner.lock.read();
        self.inner.ensure_opened()?;

        let mut documents = Vec::new();
        for id in self.inner.indices.query(path, lookup)? {
            match self.inner.load(&id)? {
                Some(document) => documents.push(document),
                None => {
                    log::error!("Index {} on {} refers to missing document {}", path, self.inner.name, id);
                    return Err(NestError::new(
                        &format!("Index {} on {} refers to missing document {}", path, self.inner.name, id),
                        ErrorKind::InternalError,
                    ));
                }
            }
        }
        Ok(documents)
    }

    /// Removes every document. Index definitions are kept.
    pub fn clear(&self) -> NestResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        let mut tx = self.inner.store.begin();
        if self.inner.store.has_map(&self.inner.name)? {
            for (key, _) in self.inner.store.open_map(&self.inner.name)?.entries()? {
                tx.remove(&self.inner.name, key);
            }
        }
        self.inner.indices.stage_clear(&mut tx)?;
        tx.commit()?;
        log::debug!("Cleared collection {}", self.inner.name);
        Ok(())
    }

    /// Removes the collection with all of its documents and indices. The
    /// handle and its clones are unusable afterwards.
    pub fn drop(&self) -> NestResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.ensure_opened()?;

        self.inner.indices.drop_all()?;
        if self.inner.store.has_map(&self.inner.name)? {
            self.inner.store.remove_map(&self.inner.name)?;
        }
        self.inner.dropped.store(true, Ordering::Release);
        log::info!("Dropped collection {}", self.inner.name);
        Ok(())
    }

    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for NestCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestCollection")
            .field("name", &self.inner.name)
            .field("dropped", &self.is_dropped())
            .finish()
    }
}

struct NestCollectionInner {
    name: String,
    store: NestStore,
    indices: IndexManager,
    id_generator: Arc<SnowflakeIdGenerator>,
    lock: RwLock<()>,
    dropped: AtomicBool,
}

impl NestCollectionInner {
    fn ensure_opened(&self) -> NestResult<()> {
        if self.dropped.load(Ordering::Acquire) {
            log::error!("Collection {} is dropped and cannot be accessed", self.name);
            return Err(NestError::new(
                &format!("Collection {} is dropped and cannot be accessed", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        if self.store.is_closed()? {
            log::error!("Store is closed; cannot access collection {}", self.name);
            return Err(NestError::new(
                "Store is closed. Reopen the database to continue",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn load(&self, id: &NestId) -> NestResult<Option<Document>> {
        if !self.store.has_map(&self.name)? {
            return Ok(None);
        }
        match self.store.open_map(&self.name)?.get(&encode_id(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn stage_insert(&self, tx: &mut Transaction, mut document: Document) -> NestResult<NestId> {
        let id = match document.has_id() {
            true => {
                let id = document.id()?;
                self.id_generator.advance_past(&id);
                id
            }
            false => {
                let id = self.id_generator.next_id()?;
                document.set_id(id);
                id
            }
        };

        let key = encode_id(&id);
        if tx.contains_key(&self.name, &key)? {
            log::error!("Document with id {} already exists in {}", id, self.name);
            return Err(NestError::new(
                &format!("Document with id {} already exists in collection {}", id, self.name),
                ErrorKind::UniqueConstraintViolation,
            ));
        }

        self.indices.on_insert(tx, &id, &document)?;
        tx.put(&self.name, key, encode(&document)?);
        Ok(id)
    }

    fn stage_update(
        &self,
        tx: &mut Transaction,
        id: &NestId,
        old: &Document,
        new: &Document,
    ) -> NestResult<()> {
        self.indices.on_update(tx, id, old, new)?;
        tx.put(&self.name, encode_id(id), encode(new)?);
        Ok(())
    }
}

/// Collection names become map names, so they may not collide with the
/// reserved system maps or the separator used in index map names.
pub(crate) fn validate_collection_name(name: &str) -> NestResult<()> {
    if name.trim().is_empty() {
        log::error!("Collection name cannot be empty");
        return Err(NestError::new(
            "Collection name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }
    if name.starts_with(SYSTEM_NAME_PREFIX) {
        log::error!("Collection name {} uses the reserved prefix {}", name, SYSTEM_NAME_PREFIX);
        return Err(NestError::new(
            &format!("Collection name {} uses the reserved prefix {}", name, SYSTEM_NAME_PREFIX),
            ErrorKind::ValidationError,
        ));
    }
    if name.contains(NAME_SEPARATOR) {
        log::error!("Collection name {} contains the reserved separator {}", name, NAME_SEPARATOR);
        return Err(NestError::new(
            &format!("Collection name {} contains the reserved separator {}", name, NAME_SEPARATOR),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Value, DOC_ID};
    use crate::doc;
    use crate::store::memory::InMemoryStore;

    fn open(name: &str) -> (NestStore, NestCollection) {
        let store = NestStore::new(InMemoryStore::new());
        store.open_or_create().unwrap();
        let collection = NestCollection::open(
            name,
            store.clone(),
            Tokenizer::new(["the".to_string()].into_iter().collect()),
            Arc::new(SnowflakeIdGenerator::new()),
        )
        .unwrap();
        (store, collection)
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let (_, employees) = open("employees");
        let first = employees.insert(doc! { name: "a" }).unwrap();
        let second = employees.insert(doc! { name: "b" }).unwrap();
        assert!(first < second);

        let stored = employees.get_by_id(&first).unwrap().unwrap();
        assert_eq!(stored.id().unwrap(), first);
        assert_eq!(stored.get("name"), Some(Value::from("a")));
        assert_eq!(employees.size().unwrap(), 2);
    }

    #[test]
    fn insert_with_taken_id_fails() {
        let (_, employees) = open("employees");
        let mut document = doc! { name: "a" };
        document.put(DOC_ID, NestId::from(7)).unwrap();
        employees.insert(document.clone()).unwrap();

        let err = employees.insert(document).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
        assert_eq!(employees.size().unwrap(), 1);
    }

    #[test]
    fn largest_explicit_id_stops_id_assignment_without_panicking() {
        let (store, employees) = open("employees");
        let mut document = doc! { n: 1 };
        document.put(DOC_ID, NestId::from(u64::MAX)).unwrap();
        employees.insert(document).unwrap();

        let err = employees.insert(doc! { n: 2 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);

        // a fresh generator picks up the stored maximum on open
        let reopened = NestCollection::open(
            "employees",
            store,
            Tokenizer::new(Default::default()),
            Arc::new(SnowflakeIdGenerator::new()),
        )
        .unwrap();
        let err = reopened.insert(doc! { n: 2 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
        assert_eq!(reopened.size().unwrap(), 1);

        // explicit ids below the maximum still work
        let mut document = doc! { n: 3 };
        document.put(DOC_ID, NestId::from(5)).unwrap();
        assert_eq!(reopened.insert(document).unwrap(), NestId::from(5));
    }

    #[test]
    fn nested_index_follows_updates() {
        let (_, employees) = open("employees");
        employees.create_index("familyName", IndexKind::NonUnique).unwrap();
        employees.create_index("literature.ratings", IndexKind::NonUnique).unwrap();

        let id = employees
            .insert(doc! { empId: 1, familyName: "Doe", literature: { text: "x", ratings: 5 } })
            .unwrap();
        assert_eq!(employees.query_index("literature.ratings", &IndexLookup::eq(5)).unwrap(), vec![id]);

        let mut document = employees.get_by_id(&id).unwrap().unwrap();
        document.put("literature.ratings", 7).unwrap();
        employees.update(document).unwrap();

        assert!(employees.query_index("literature.ratings", &IndexLookup::eq(5)).unwrap().is_empty());
        assert_eq!(employees.query_index("literature.ratings", &IndexLookup::eq(7)).unwrap(), vec![id]);
        assert_eq!(employees.query_index("familyName", &IndexLookup::eq("Doe")).unwrap(), vec![id]);
    }

    #[test]
    fn unique_violation_leaves_collection_untouched() {
        let (_, employees) = open("employees");
        employees.create_index("empId", IndexKind::Unique).unwrap();
        employees.insert(doc! { empId: 1, name: "first" }).unwrap();

        let err = employees.insert(doc! { empId: 1, name: "second" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
        let all = employees.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("name"), Some(Value::from("first")));
    }

    #[test]
    fn insert_many_is_all_or_nothing() {
        let (_, employees) = open("employees");
        employees.create_index("code", IndexKind::Unique).unwrap();
        let err = employees
            .insert_many(vec![doc! { code: 1 }, doc! { code: 2 }, doc! { code: 1 }])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
        assert_eq!(employees.size().unwrap(), 0);
        assert!(employees.query_index("code", &IndexLookup::eq(2)).unwrap().is_empty());

        let ids = employees.insert_many(vec![doc! { code: 1 }, doc! { code: 2 }]).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(employees.query_index("code", &IndexLookup::eq(2)).unwrap(), vec![ids[1]]);
    }

    #[test]
    fn update_missing_document_fails() {
        let (_, employees) = open("employees");
        let mut document = doc! { name: "ghost" };
        assert_eq!(employees.update(document.clone()).unwrap_err().kind(), &ErrorKind::InvalidId);

        document.put(DOC_ID, NestId::from(99)).unwrap();
        assert_eq!(employees.update(document).unwrap_err().kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let (_, employees) = open("employees");
        let id = employees.upsert(doc! { name: "a" }).unwrap();
        let mut document = employees.get_by_id(&id).unwrap().unwrap();
        document.put("name", "b").unwrap();
        assert_eq!(employees.upsert(document).unwrap(), id);
        assert_eq!(employees.size().unwrap(), 1);
        assert_eq!(
            employees.get_by_id(&id).unwrap().unwrap().get("name"),
            Some(Value::from("b"))
        );
    }

    #[test]
    fn remove_drops_index_entries() {
        let (_, employees) = open("employees");
        employees.create_index("dept", IndexKind::NonUnique).unwrap();
        let first = employees.insert(doc! { dept: "ops" }).unwrap();
        let second = employees.insert(doc! { dept: "ops" }).unwrap();

        assert!(employees.remove(&first).unwrap().is_some());
        assert!(employees.remove(&first).unwrap().is_none());
        assert_eq!(employees.query_index("dept", &IndexLookup::eq("ops")).unwrap(), vec![second]);
    }

    #[test]
    fn find_by_index_returns_documents() {
        let (_, books) = open("books");
        books.create_index("title", IndexKind::FullText).unwrap();
        books.insert(doc! { title: "the quick fox" }).unwrap();
        books.insert(doc! { title: "slow turtle" }).unwrap();

        assert!(books.find_by_index("title", &IndexLookup::text("the")).unwrap().is_empty());
        let hits = books.find_by_index("title", &IndexLookup::text("fox")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("title"), Some(Value::from("the quick fox")));
    }

    #[test]
    fn clear_keeps_index_definitions() {
        let (_, employees) = open("employees");
        employees.create_index("dept", IndexKind::NonUnique).unwrap();
        employees.insert(doc! { dept: "ops" }).unwrap();
        employees.clear().unwrap();

        assert_eq!(employees.size().unwrap(), 0);
        assert!(employees.has_index("dept").unwrap());
        assert!(employees.query_index("dept", &IndexLookup::eq("ops")).unwrap().is_empty());
        employees.insert(doc! { dept: "ops" }).unwrap();
        assert_eq!(employees.query_index("dept", &IndexLookup::eq("ops")).unwrap().len(), 1);
    }

    #[test]
    fn dropped_collection_rejects_calls() {
        let (store, employees) = open("employees");
        employees.create_index("dept", IndexKind::NonUnique).unwrap();
        employees.insert(doc! { dept: "ops" }).unwrap();
        employees.drop().unwrap();

        assert!(employees.is_dropped());
        assert!(!store.has_map("employees").unwrap());
        assert_eq!(employees.size().unwrap_err().kind(), &ErrorKind::InvalidOperation);
        assert!(store.map_names().unwrap().iter().all(|name| !name.contains("employees")));
    }

    #[test]
    fn reopened_collection_keeps_ids_monotonic() {
        let (store, employees) = open("employees");
        let mut document = doc! { name: "future" };
        let far = NestId::from(u64::MAX / 2);
        document.put(DOC_ID, far).unwrap();
        employees.insert(document).unwrap();

        let reopened = NestCollection::open(
            "employees",
            store.clone(),
            Tokenizer::default(),
            Arc::new(SnowflakeIdGenerator::new()),
        )
        .unwrap();
        let next = reopened.insert(doc! { name: "next" }).unwrap();
        assert!(next > far);
    }

    #[test]
    fn reserved_names_are_rejected() {
        for name in ["", "$nest_catalog", "a|b"] {
            let err = validate_collection_name(name).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
        }
        assert!(validate_collection_name("employees").is_ok());
    }

    #[test]
    fn closed_store_rejects_calls() {
        let (store, employees) = open("employees");
        store.close().unwrap();
        let err = employees.insert(doc! { a: 1 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
    }
}
