use crate::collection::NestId;
use crate::common::{FieldPath, FieldValue, PathSegment, Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{ErrorKind, NestError, NestResult};
use indexmap::IndexMap;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// An ordered, nested key-value record.
///
/// Field order is kept as inserted and reported by [`fields`](Self::fields), but
/// it carries no meaning for equality, ordering or hashing: two documents with
/// the same fields and values are equal whatever order they were built in.
///
/// Paths address nested content with dots (`address.city`) and sequence
/// elements with a numeric segment or brackets (`tags.0`, `tags[0]`). Path
/// lookups never fail; anything that cannot be resolved is absent.
///
/// # Examples
///
/// ```rust
/// use nestdb::doc;
/// use nestdb::common::Value;
///
/// let doc = doc! {
///     name: "Jane",
///     address: { city: "Oslo", zip: 150 },
///     tags: ["a", "b"],
/// };
/// assert_eq!(doc.get("address.city"), Some(Value::from("Oslo")));
/// assert_eq!(doc.get("tags[1]"), Some(Value::from("b")));
/// assert_eq!(doc.get("address.street"), None);
/// ```
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sets the value at `path`, creating intermediate documents as needed.
    ///
    /// The reserved `_id` field only accepts [`NestId`] values. Writing through
    /// a sequence requires the addressed element to exist.
    pub fn put<T: Into<Value>>(&mut self, path: &str, value: T) -> NestResult<()> {
        let value = value.into();
        let path = FieldPath::parse(path)?;

        if path.as_str() == DOC_ID && !matches!(value, Value::NestId(_)) {
            log::error!("Field {} only accepts NestId values, got {:?}", DOC_ID, value);
            return Err(NestError::new(
                &format!("Field {} only accepts NestId values", DOC_ID),
                ErrorKind::InvalidId,
            ));
        }

        put_in_document(self, path.segments(), value)
    }

    /// Resolves `path`, returning `None` when any part of it is missing.
    ///
    /// A name applied to a sequence of documents is resolved against every
    /// element; the results are flattened into one sequence without duplicates.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.data.get(path) {
            return Some(value.clone());
        }

        match FieldPath::parse(path) {
            Ok(path) => self.resolve(&path),
            Err(_) => None,
        }
    }

    pub(crate) fn resolve(&self, path: &FieldPath) -> Option<Value> {
        resolve_in_document(self, path.segments())
    }

    /// Reads the value at `path` as `T`. Absent paths yield `Ok(None)`.
    pub fn get_as<T: FieldValue>(&self, path: &str) -> NestResult<Option<T>> {
        match self.get(path) {
            Some(value) => T::from_value(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Top-level field lookup without path interpretation.
    #[inline]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Removes the value at `path`, returning it if it was present.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        if let Some(value) = self.data.shift_remove(path) {
            return Some(value);
        }

        let path = FieldPath::parse(path).ok()?;
        remove_in_document(self, path.segments())
    }

    /// Top-level field names in insertion order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Every leaf path, descending into nested documents. The `_id` field is
    /// left out.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(self, "", &mut paths);
        paths
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    #[inline]
    pub fn contains_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn has_id(&self) -> bool {
        matches!(self.data.get(DOC_ID), Some(Value::NestId(_)))
    }

    pub fn id(&self) -> NestResult<NestId> {
        match self.data.get(DOC_ID) {
            Some(Value::NestId(id)) => Ok(*id),
            Some(other) => {
                log::error!("Invalid {} value {:?}", DOC_ID, other);
                Err(NestError::new(
                    &format!("Invalid {} value {}", DOC_ID, other),
                    ErrorKind::InvalidId,
                ))
            }
            None => {
                log::error!("Document has no {} field", DOC_ID);
                Err(NestError::new(
                    &format!("Document has no {} field", DOC_ID),
                    ErrorKind::InvalidId,
                ))
            }
        }
    }

    pub(crate) fn set_id(&mut self, id: NestId) {
        self.data.insert(DOC_ID.to_string(), Value::NestId(id));
    }

    /// Overlays `other` onto this document; nested documents merge field by field.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get_mut(key), value) {
                (Some(Value::Document(existing)), Value::Document(incoming)) => {
                    existing.merge(incoming)
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn sorted_entries(&self) -> Vec<(&String, &Value)> {
        self.data.iter().sorted_by(|a, b| a.0.cmp(b.0)).collect()
    }
}

fn resolve_in_document(doc: &Document, segments: &[PathSegment]) -> Option<Value> {
    match segments.split_first() {
        None => Some(Value::Document(doc.clone())),
        Some((PathSegment::Name(name), rest)) => {
            let value = doc.data.get(name)?;
            resolve_in_value(value, rest)
        }
        Some((PathSegment::Index(_), _)) => None,
    }
}

fn resolve_in_value(value: &Value, segments: &[PathSegment]) -> Option<Value> {
    let Some((segment, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Document(doc) => resolve_in_document(doc, segments),
        Value::Array(items) => match segment.as_index() {
            Some(index) => items.get(index).and_then(|item| resolve_in_value(item, rest)),
            None => project(items, segments),
        },
        _ => None,
    }
}

fn project(items: &[Value], segments: &[PathSegment]) -> Option<Value> {
    let mut projected: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        match resolve_in_value(item, segments) {
            Some(Value::Array(values)) => projected.extend(values),
            Some(value) => projected.push(value),
            None => {}
        }
    }

    if projected.is_empty() {
        None
    } else {
        Some(Value::Array(projected.into_iter().unique().collect()))
    }
}

fn put_in_document(doc: &mut Document, segments: &[PathSegment], value: Value) -> NestResult<()> {
    match segments.split_first() {
        Some((PathSegment::Name(name), [])) => {
            doc.data.insert(name.clone(), value);
            Ok(())
        }
        Some((PathSegment::Name(name), rest)) => {
            let slot = doc
                .data
                .entry(name.clone())
                .or_insert_with(|| Value::Document(Document::new()));
            put_in_value(slot, rest, value)
        }
        Some((PathSegment::Index(index), _)) => {
            log::error!("Cannot address a document by index {}", index);
            Err(NestError::new(
                &format!("Cannot address a document by index {}", index),
                ErrorKind::InvalidOperation,
            ))
        }
        None => Ok(()),
    }
}

fn put_in_value(slot: &mut Value, segments: &[PathSegment], value: Value) -> NestResult<()> {
    match slot {
        Value::Document(doc) => put_in_document(doc, segments, value),
        Value::Array(items) => {
            let Some((segment, rest)) = segments.split_first() else {
                return Ok(());
            };
            let len = items.len();
            let target = segment
                .as_index()
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| {
                    log::error!("Array position {:?} is out of bounds for length {}", segment, len);
                    NestError::new(
                        &format!("Array position {:?} is out of bounds for length {}", segment, len),
                        ErrorKind::ValidationError,
                    )
                })?;
            if rest.is_empty() {
                *target = value;
                Ok(())
            } else {
                put_in_value(target, rest, value)
            }
        }
        other => {
            log::error!("Cannot put a nested field into a {} value", other.type_name());
            Err(NestError::new(
                &format!("Cannot put a nested field into a {} value", other.type_name()),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

fn remove_in_document(doc: &mut Document, segments: &[PathSegment]) -> Option<Value> {
    match segments.split_first()? {
        (PathSegment::Name(name), []) => doc.data.shift_remove(name),
        (PathSegment::Name(name), rest) => remove_in_value(doc.data.get_mut(name)?, rest),
        (PathSegment::Index(_), _) => None,
    }
}

fn remove_in_value(value: &mut Value, segments: &[PathSegment]) -> Option<Value> {
    match value {
        Value::Document(doc) => remove_in_document(doc, segments),
        Value::Array(items) => {
            let (segment, rest) = segments.split_first()?;
            let index = segment.as_index()?;
            if index >= items.len() {
                None
            } else if rest.is_empty() {
                Some(items.remove(index))
            } else {
                remove_in_value(&mut items[index], rest)
            }
        }
        _ => None,
    }
}

fn collect_paths(doc: &Document, prefix: &str, paths: &mut Vec<String>) {
    for (key, value) in doc.data.iter() {
        if prefix.is_empty() && key == DOC_ID {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, FIELD_SEPARATOR, key)
        };
        match value {
            Value::Document(nested) if !nested.is_empty() => collect_paths(nested, &path, paths),
            _ => paths.push(path),
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .all(|(key, value)| other.data.get(key) == Some(value))
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_entries().cmp(&other.sorted_entries())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (key, value) in self.sorted_entries() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.data
                .iter()
                .map(|(key, value)| format!("\"{}\": {}", key, value))
                .join(", ")
        )
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

#[doc(hidden)]
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [`Document`] with JSON-like syntax.
///
/// Keys may be bare identifiers or string literals; string keys containing
/// dots are written as nested paths.
///
/// ```rust
/// use nestdb::doc;
///
/// let base = 100;
/// let doc = doc! {
///     name: "Bob",
///     score: (base * 2),
///     "literature.ratings": 5,
///     tags: ["admin", "user"],
/// };
/// assert_eq!(doc.get("literature.ratings"), Some(nestdb::val!(5)));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.put(&$crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn sample() -> Document {
        doc! {
            score: 1034,
            location: {
                state: "NY",
                address: {
                    line1: "40",
                    house: ["1", "2", "3"],
                    zip: 10001,
                },
            },
            category: ["food", "produce", "grocery"],
            books: [
                { name: "Book ABCD", tag: ["tag1", "tag2"] },
                { name: "Book EFGH", tag: ["tag3", "tag1"] },
                { name: "No Tag" },
            ],
        }
    }

    #[test]
    fn test_get_nested_paths() {
        let doc = sample();
        assert_eq!(doc.get("score"), Some(val!(1034)));
        assert_eq!(doc.get("location.state"), Some(val!("NY")));
        assert_eq!(doc.get("location.address.zip"), Some(val!(10001)));
        assert_eq!(doc.get("location.address.house.1"), Some(val!("2")));
        assert_eq!(doc.get("location.address.house[2]"), Some(val!("3")));
        assert_eq!(doc.get("books[1].name"), Some(val!("Book EFGH")));
    }

    #[test]
    fn test_get_is_total() {
        let doc = sample();
        assert_eq!(doc.get("missing"), None);
        assert_eq!(doc.get("location.city"), None);
        assert_eq!(doc.get("score.value"), None);
        assert_eq!(doc.get("category.10"), None);
        assert_eq!(doc.get("location[0]"), None);
        assert_eq!(doc.get("a..b"), None);
        assert_eq!(doc.get(""), None);
    }

    #[test]
    fn test_get_projects_over_arrays() {
        let doc = sample();
        assert_eq!(
            doc.get("books.name"),
            Some(val!(vec!["Book ABCD", "Book EFGH", "No Tag"]))
        );
        assert_eq!(
            doc.get("books.tag"),
            Some(val!(vec!["tag1", "tag2", "tag3"]))
        );
        assert_eq!(doc.get("books.isbn"), None);
    }

    #[test]
    fn test_put_creates_intermediate_documents() {
        let mut doc = Document::new();
        doc.put("literature.text", "x").unwrap();
        doc.put("literature.ratings", 5).unwrap();
        assert_eq!(doc.get("literature"), Some(Value::Document(doc! { text: "x", ratings: 5 })));
        assert_eq!(doc.fields(), vec!["literature".to_string()]);
    }

    #[test]
    fn test_put_into_array_element() {
        let mut doc = sample();
        doc.put("books.0.name", "Renamed").unwrap();
        doc.put("category[1]", "fruit").unwrap();
        assert_eq!(doc.get("books[0].name"), Some(val!("Renamed")));
        assert_eq!(doc.get("category.1"), Some(val!("fruit")));

        let err = doc.put("category.9", "x").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_put_through_scalar_fails() {
        let mut doc = doc! { score: 1 };
        let err = doc.put("score.value", 2).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert_eq!(doc.get("score"), Some(val!(1)));
    }

    #[test]
    fn test_put_reserved_id() {
        let mut doc = Document::new();
        let err = doc.put(DOC_ID, "abc").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);

        doc.put(DOC_ID, NestId::from(5)).unwrap();
        assert!(doc.has_id());
        assert_eq!(doc.id().unwrap(), NestId::from(5));
    }

    #[test]
    fn test_id_missing() {
        let doc = doc! { a: 1 };
        assert!(!doc.has_id());
        assert_eq!(doc.id().unwrap_err().kind(), &ErrorKind::InvalidId);
    }

    #[test]
    fn test_remove() {
        let mut doc = sample();
        assert_eq!(doc.remove("location.address.zip"), Some(val!(10001)));
        assert_eq!(doc.get("location.address.zip"), None);
        assert_eq!(doc.remove("category.0"), Some(val!("food")));
        assert_eq!(doc.get("category"), Some(val!(vec!["produce", "grocery"])));
        assert_eq!(doc.remove("score"), Some(val!(1034)));
        assert_eq!(doc.remove("score"), None);
        assert_eq!(doc.remove("books.name"), None);
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let doc = doc! { zeta: 1, alpha: 2, mid: 3 };
        assert_eq!(doc.fields(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_equality_ignores_field_order() {
        let first = doc! { a: 1, b: { c: 2, d: 3 } };
        let second = doc! { b: { d: 3, c: 2 }, a: 1 };
        assert_eq!(first, second);

        let third = doc! { a: 1, b: { c: 2 } };
        assert_ne!(first, third);
    }

    #[test]
    fn test_equality_is_order_sensitive_for_arrays() {
        assert_ne!(doc! { a: [1, 2] }, doc! { a: [2, 1] });
    }

    #[test]
    fn test_paths() {
        let doc = doc! { a: 1, b: { c: 2, d: { e: 3 } }, f: [1], g: {} };
        assert_eq!(doc.paths(), vec!["a", "b.c", "b.d.e", "f", "g"]);
    }

    #[test]
    fn test_merge() {
        let mut doc = doc! { a: 1, b: { c: 2, d: 3 } };
        doc.merge(&doc! { b: { d: 4, e: 5 }, f: 6 });
        assert_eq!(doc, doc! { a: 1, b: { c: 2, d: 4, e: 5 }, f: 6 });
    }

    #[test]
    fn test_get_as() {
        let doc = sample();
        assert_eq!(doc.get_as::<i64>("score").unwrap(), Some(1034));
        assert_eq!(doc.get_as::<String>("location.state").unwrap(), Some("NY".to_string()));
        assert_eq!(doc.get_as::<String>("nothing").unwrap(), None);
        assert!(doc.get_as::<bool>("score").is_err());
    }

    #[test]
    fn test_dotted_keys_in_macro_are_nested() {
        let doc = doc! { "literature.ratings": 5 };
        assert_eq!(doc.get("literature"), Some(Value::Document(doc! { ratings: 5 })));
    }

    #[test]
    fn test_display() {
        let doc = doc! { a: 1, b: "x" };
        assert_eq!(doc.to_string(), "{\"a\": 1, \"b\": \"x\"}");
    }
}
