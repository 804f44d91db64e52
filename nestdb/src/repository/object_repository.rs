use crate::collection::{Document, NestCollection, NestId};
use crate::errors::NestResult;
use crate::index::{IndexDescriptor, IndexKind, IndexLookup};
use crate::mapper::{Convertible, NestMapper};
use std::marker::PhantomData;

/// Typed access to a collection.
///
/// Values go through the database's [`NestMapper`] on the way in and out, so
/// the repository stores plain documents that any [`NestCollection`] handle on
/// the same name can read.
pub struct ObjectRepository<T: Convertible> {
    collection: NestCollection,
    mapper: NestMapper,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Convertible> Clone for ObjectRepository<T> {
    fn clone(&self) -> Self {
        ObjectRepository {
            collection: self.collection.clone(),
            mapper: self.mapper.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Convertible> ObjectRepository<T> {
    pub(crate) fn new(collection: NestCollection, mapper: NestMapper) -> Self {
        ObjectRepository {
            collection,
            mapper,
            _marker: PhantomData,
        }
    }

    pub fn insert(&self, object: &T) -> NestResult<NestId> {
        self.collection.insert(self.mapper.to_document(object)?)
    }

    pub fn insert_many(&self, objects: &[T]) -> NestResult<Vec<NestId>> {
        let documents = objects
            .iter()
            .map(|object| self.mapper.to_document(object))
            .collect::<NestResult<Vec<Document>>>()?;
        self.collection.insert_many(documents)
    }

    /// Replaces the stored object with id `id`.
    pub fn update(&self, id: &NestId, object: &T) -> NestResult<()> {
        let mut document = self.mapper.to_document(object)?;
        document.set_id(*id);
        self.collection.update(document)
    }

    /// Stores `object` under `id`, replacing whatever is stored there.
    ///
    /// Converted objects carry no `_id`, so the id is passed explicitly just
    /// like [`update`](Self::update).
    pub fn upsert(&self, id: &NestId, object: &T) -> NestResult<NestId> {
        let mut document = self.mapper.to_document(object)?;
        document.set_id(*id);
        self.collection.upsert(document)
    }

    pub fn remove(&self, id: &NestId) -> NestResult<Option<T>> {
        let removed = self.collection.remove(id)?;
        self.mapper.from_document(removed.as_ref())
    }

    pub fn get_by_id(&self, id: &NestId) -> NestResult<Option<T>> {
        let document = self.collection.get_by_id(id)?;
        self.mapper.from_document(document.as_ref())
    }

    /// Every stored object with its id, in id order.
    pub fn find_all(&self) -> NestResult<Vec<(NestId, T)>> {
        self.read_all(self.collection.find_all()?)
    }

    pub fn find_by_index(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<(NestId, T)>> {
        self.read_all(self.collection.find_by_index(path, lookup)?)
    }

    pub fn query_index(&self, path: &str, lookup: &IndexLookup) -> NestResult<Vec<NestId>> {
        self.collection.query_index(path, lookup)
    }

    pub fn create_index(&self, path: &str, kind: IndexKind) -> NestResult<IndexDescriptor> {
        self.collection.create_index(path, kind)
    }

    pub fn drop_index(&self, path: &str) -> NestResult<()> {
        self.collection.drop_index(path)
    }

    pub fn drop_all_indices(&self) -> NestResult<()> {
        self.collection.drop_all_indices()
    }

    pub fn has_index(&self, path: &str) -> NestResult<bool> {
        self.collection.has_index(path)
    }

    pub fn list_indices(&self) -> NestResult<Vec<IndexDescriptor>> {
        self.collection.list_indices()
    }

    pub fn size(&self) -> NestResult<u64> {
        self.collection.size()
    }

    pub fn clear(&self) -> NestResult<()> {
        self.collection.clear()
    }

    pub fn drop(&self) -> NestResult<()> {
        self.collection.drop()
    }

    pub fn is_dropped(&self) -> bool {
        self.collection.is_dropped()
    }

    /// The untyped collection behind this repository.
    pub fn document_collection(&self) -> &NestCollection {
        &self.collection
    }

    fn read_all(&self, documents: Vec<Document>) -> NestResult<Vec<(NestId, T)>> {
        let mut objects = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.id()?;
            let object = self.mapper.instantiate::<T>().and_then(|mut object| {
                object.read(&self.mapper, &document)?;
                Ok(object)
            })?;
            objects.push((id, object));
        }
        Ok(objects)
    }
}

/// Name of the collection backing a repository of `T`, optionally qualified
/// by a key so several repositories of one type can coexist.
pub(crate) fn repository_name<T: Convertible>(key: Option<&str>) -> String {
    let type_name = std::any::type_name::<T>();
    match key {
        Some(key) => format!("{}+{}", type_name, key),
        None => type_name.to_string(),
    }
}
