use crate::collection::{Document, NestId};
use crate::common::{FieldValue, Value};
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::mapper::Convertible;
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Groups of leaf types that can be registered in one call, the way an
/// abstract numeric type stands for all of its concrete widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafFamily {
    Boolean,
    Number,
    Text,
    Bytes,
    Temporal,
    Identifier,
}

impl LeafFamily {
    pub const ALL: [LeafFamily; 6] = [
        LeafFamily::Boolean,
        LeafFamily::Number,
        LeafFamily::Text,
        LeafFamily::Bytes,
        LeafFamily::Temporal,
        LeafFamily::Identifier,
    ];

    fn codecs(&self) -> Vec<(TypeId, LeafCodec)> {
        match self {
            LeafFamily::Boolean => vec![LeafCodec::entry::<bool>()],
            LeafFamily::Number => vec![
                LeafCodec::entry::<i8>(),
                LeafCodec::entry::<u8>(),
                LeafCodec::entry::<i16>(),
                LeafCodec::entry::<u16>(),
                LeafCodec::entry::<i32>(),
                LeafCodec::entry::<u32>(),
                LeafCodec::entry::<i64>(),
                LeafCodec::entry::<u64>(),
                LeafCodec::entry::<f32>(),
                LeafCodec::entry::<f64>(),
            ],
            LeafFamily::Text => vec![LeafCodec::entry::<String>(), LeafCodec::entry::<char>()],
            LeafFamily::Bytes => vec![LeafCodec::entry::<Vec<u8>>()],
            LeafFamily::Temporal => vec![LeafCodec::entry::<DateTime<Utc>>()],
            LeafFamily::Identifier => vec![LeafCodec::entry::<NestId>()],
        }
    }
}

#[derive(Clone, Copy)]
struct LeafCodec {
    type_name: &'static str,
    to_value: fn(&dyn Any) -> NestResult<Value>,
    from_value: fn(&Value) -> NestResult<Box<dyn Any>>,
}

impl LeafCodec {
    fn entry<T: FieldValue + 'static>() -> (TypeId, LeafCodec) {
        (
            TypeId::of::<T>(),
            LeafCodec {
                type_name: std::any::type_name::<T>(),
                to_value: leaf_to_value::<T>,
                from_value: leaf_from_value::<T>,
            },
        )
    }
}

fn leaf_to_value<T: FieldValue + 'static>(value: &dyn Any) -> NestResult<Value> {
    match value.downcast_ref::<T>() {
        Some(v) => v.to_value(),
        None => Err(type_mismatch(std::any::type_name::<T>())),
    }
}

fn leaf_from_value<T: FieldValue + 'static>(value: &Value) -> NestResult<Box<dyn Any>> {
    T::from_value(value).map(|v| Box::new(v) as Box<dyn Any>)
}

#[derive(Clone, Copy)]
struct CompositeCodec {
    type_name: &'static str,
    write: fn(&dyn Any, &NestMapper) -> NestResult<Document>,
    read: fn(&NestMapper, &Document) -> NestResult<Box<dyn Any>>,
}

impl CompositeCodec {
    fn entry<T: Convertible>() -> (TypeId, CompositeCodec) {
        (
            TypeId::of::<T>(),
            CompositeCodec {
                type_name: std::any::type_name::<T>(),
                write: composite_write::<T>,
                read: composite_read::<T>,
            },
        )
    }
}

fn composite_write<T: Convertible>(value: &dyn Any, mapper: &NestMapper) -> NestResult<Document> {
    match value.downcast_ref::<T>() {
        Some(v) => v.write(mapper),
        None => Err(type_mismatch(std::any::type_name::<T>())),
    }
}

fn composite_read<T: Convertible>(mapper: &NestMapper, document: &Document) -> NestResult<Box<dyn Any>> {
    let mut instance = mapper.instantiate::<T>()?;
    instance.read(mapper, document)?;
    Ok(Box::new(instance))
}

type Factory = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

fn type_mismatch(expected: &str) -> NestError {
    log::error!("Value handed to the {} codec has a different type", expected);
    NestError::new(
        &format!("Value handed to the {} codec has a different type", expected),
        ErrorKind::MappingError,
    )
}

fn downcast<T: Any>(value: Box<dyn Any>) -> NestResult<T> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| type_mismatch(std::any::type_name::<T>()))
}

/// Mutable set of mapper registrations, frozen into a [`NestMapper`] when the
/// database opens.
///
/// The default registry classifies every built-in scalar family as a leaf and
/// knows [`Document`] as a composite.
#[derive(Clone)]
pub struct MapperRegistry {
    leaf_codecs: HashMap<TypeId, LeafCodec>,
    families: HashSet<LeafFamily>,
    composites: HashMap<TypeId, CompositeCodec>,
    factories: HashMap<TypeId, Factory>,
}

impl MapperRegistry {
    /// A registry without any leaf types; only [`Value`] and [`Document`] are known.
    pub fn empty() -> Self {
        let mut registry = MapperRegistry {
            leaf_codecs: HashMap::new(),
            families: HashSet::new(),
            composites: HashMap::new(),
            factories: HashMap::new(),
        };
        registry.register_leaf_type::<Value>();
        registry.register_convertible::<Document>();
        registry
    }

    pub fn register_leaf_type<T: FieldValue + 'static>(&mut self) {
        let (type_id, codec) = LeafCodec::entry::<T>();
        log::debug!("Registering leaf type {}", codec.type_name);
        self.leaf_codecs.insert(type_id, codec);
    }

    pub fn register_leaf_family(&mut self, family: LeafFamily) {
        if self.families.insert(family) {
            log::debug!("Registering leaf family {:?}", family);
            self.leaf_codecs.extend(family.codecs());
        }
    }

    pub fn register_convertible<T: Convertible>(&mut self) {
        let (type_id, codec) = CompositeCodec::entry::<T>();
        log::debug!("Registering convertible type {}", codec.type_name);
        self.composites.insert(type_id, codec);
    }

    /// Registers `factory` as the way to create blank `T` instances. It takes
    /// precedence over [`Convertible::instantiate`].
    pub fn register_factory<T, F>(&mut self, factory: F)
    where
        T: Convertible,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_convertible::<T>();
        self.factories.insert(
            TypeId::of::<T>(),
            Arc::new(move || Box::new(factory()) as Box<dyn Any>),
        );
    }

    /// Shorthand for a factory built from `T::default()`.
    pub fn register_default<T: Convertible + Default>(&mut self) {
        self.register_factory::<T, _>(T::default);
    }

    pub fn families(&self) -> &HashSet<LeafFamily> {
        &self.families
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        let mut registry = MapperRegistry::empty();
        for family in LeafFamily::ALL {
            registry.register_leaf_family(family);
        }
        registry
    }
}

/// Converts between domain values and [`Document`]s.
///
/// Every type is either a leaf, stored atomically as one [`Value`], or a
/// composite [`Convertible`] decomposed into a document. The classification is
/// fixed when the mapper is built from a [`MapperRegistry`]; a mapper is
/// immutable and cheap to clone.
#[derive(Clone)]
pub struct NestMapper {
    inner: Arc<NestMapperInner>,
}

struct NestMapperInner {
    leaf_codecs: HashMap<TypeId, LeafCodec>,
    composites: HashMap<TypeId, CompositeCodec>,
    factories: HashMap<TypeId, Factory>,
}

impl NestMapper {
    pub fn new(registry: MapperRegistry) -> Self {
        NestMapper {
            inner: Arc::new(NestMapperInner {
                leaf_codecs: registry.leaf_codecs,
                composites: registry.composites,
                factories: registry.factories,
            }),
        }
    }

    pub fn is_leaf_type<T: Any>(&self) -> bool {
        self.inner.leaf_codecs.contains_key(&TypeId::of::<T>())
    }

    pub fn is_leaf_value(&self, value: &dyn Any) -> bool {
        self.inner.leaf_codecs.contains_key(&(*value).type_id())
    }

    pub fn is_convertible_type<T: Any>(&self) -> bool {
        self.inner.composites.contains_key(&TypeId::of::<T>())
    }

    /// Writes a composite value into a new document.
    #[inline]
    pub fn to_document<T: Convertible>(&self, value: &T) -> NestResult<Document> {
        value.write(self)
    }

    /// Writes a value of a registered composite type into a new document.
    pub fn to_document_dyn(&self, value: &dyn Any) -> NestResult<Document> {
        let type_id = (*value).type_id();
        match self.inner.composites.get(&type_id) {
            Some(codec) => (codec.write)(value, self),
            None => {
                log::error!("Value of type {:?} is not a registered convertible type", type_id);
                Err(NestError::new(
                    "Value is neither a document nor a registered convertible type",
                    ErrorKind::MappingError,
                ))
            }
        }
    }

    /// Builds a `T` from `document`. An absent document yields `Ok(None)`.
    pub fn from_document<T: Convertible>(&self, document: Option<&Document>) -> NestResult<Option<T>> {
        let Some(document) = document else {
            return Ok(None);
        };
        let mut instance = self.instantiate::<T>()?;
        instance.read(self, document)?;
        Ok(Some(instance))
    }

    /// Creates a blank `T`, trying the registered factory first and
    /// [`Convertible::instantiate`] second.
    pub fn instantiate<T: Convertible>(&self) -> NestResult<T> {
        if let Some(factory) = self.inner.factories.get(&TypeId::of::<T>()) {
            return downcast::<T>(factory());
        }

        T::instantiate().ok_or_else(|| {
            log::error!("No instantiation strategy for {}", std::any::type_name::<T>());
            NestError::new(
                &format!(
                    "No factory registered and no default instance for {}",
                    std::any::type_name::<T>()
                ),
                ErrorKind::MappingError,
            )
        })
    }

    /// Converts `value` into a `T`.
    ///
    /// A leaf value converted to its own type comes back unchanged. A
    /// registered composite converts to [`Document`] and a [`Document`] to a
    /// registered composite. Every other combination is a mapping error.
    pub fn convert<S: Any, T: Any>(&self, value: S) -> NestResult<T> {
        let source = TypeId::of::<S>();
        let target = TypeId::of::<T>();
        let document = TypeId::of::<Document>();

        if source == target && (self.inner.leaf_codecs.contains_key(&source) || source == document) {
            return downcast::<T>(Box::new(value));
        }

        if target == document {
            if let Some(codec) = self.inner.composites.get(&source) {
                let doc = (codec.write)(&value, self)?;
                return downcast::<T>(Box::new(doc));
            }
        }

        if source == document {
            if let Some(codec) = self.inner.composites.get(&target) {
                let doc = downcast::<Document>(Box::new(value))?;
                return downcast::<T>((codec.read)(self, &doc)?);
            }
        }

        log::error!(
            "Cannot convert {} to {}",
            std::any::type_name::<S>(),
            std::any::type_name::<T>()
        );
        Err(NestError::new(
            &format!(
                "Cannot convert {} to {}",
                std::any::type_name::<S>(),
                std::any::type_name::<T>()
            ),
            ErrorKind::MappingError,
        ))
    }

    /// Renders one field value: leaves through their codec, composites as a
    /// nested document.
    pub fn to_value<V: Any>(&self, value: &V) -> NestResult<Value> {
        let type_id = TypeId::of::<V>();
        if let Some(codec) = self.inner.leaf_codecs.get(&type_id) {
            return (codec.to_value)(value);
        }
        if let Some(codec) = self.inner.composites.get(&type_id) {
            return (codec.write)(value, self).map(Value::Document);
        }

        log::error!("Type {} is neither a leaf nor convertible", std::any::type_name::<V>());
        Err(NestError::new(
            &format!("Type {} is neither a leaf nor convertible", std::any::type_name::<V>()),
            ErrorKind::MappingError,
        ))
    }

    /// Reads one field value back into `V`.
    pub fn from_value<V: Any>(&self, value: &Value) -> NestResult<V> {
        let type_id = TypeId::of::<V>();
        if let Some(codec) = self.inner.leaf_codecs.get(&type_id) {
            return downcast::<V>((codec.from_value)(value)?);
        }
        if let Some(codec) = self.inner.composites.get(&type_id) {
            return match value {
                Value::Document(doc) => downcast::<V>((codec.read)(self, doc)?),
                other => {
                    log::error!("Expected a document for {}, found {}", codec.type_name, other.type_name());
                    Err(NestError::new(
                        &format!("Expected a document for {}, found {}", codec.type_name, other.type_name()),
                        ErrorKind::MappingError,
                    ))
                }
            };
        }

        log::error!("Type {} is neither a leaf nor convertible", std::any::type_name::<V>());
        Err(NestError::new(
            &format!("Type {} is neither a leaf nor convertible", std::any::type_name::<V>()),
            ErrorKind::MappingError,
        ))
    }

    pub fn write_field<V: Any>(&self, document: &mut Document, path: &str, value: &V) -> NestResult<()> {
        let value = self.to_value(value)?;
        document.put(path, value)
    }

    /// Reads the field at `path`; a missing field or an explicit null is `None`.
    pub fn read_field<V: Any>(&self, document: &Document, path: &str) -> NestResult<Option<V>> {
        match document.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.from_value::<V>(&value).map(Some),
        }
    }

    pub fn to_array<V: Any>(&self, values: &[V]) -> NestResult<Value> {
        values
            .iter()
            .map(|v| self.to_value(v))
            .collect::<NestResult<Vec<Value>>>()
            .map(Value::Array)
    }

    pub fn from_array<V: Any>(&self, value: &Value) -> NestResult<Vec<V>> {
        match value {
            Value::Array(items) => items.iter().map(|item| self.from_value::<V>(item)).collect(),
            other => {
                log::error!("Expected an array, found {}", other.type_name());
                Err(NestError::new(
                    &format!("Expected an array, found {}", other.type_name()),
                    ErrorKind::MappingError,
                ))
            }
        }
    }
}

impl Default for NestMapper {
    fn default() -> Self {
        NestMapper::new(MapperRegistry::default())
    }
}
