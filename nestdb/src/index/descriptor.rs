use crate::common::{FULL_TEXT_INDEX, INDEX_PREFIX, NAME_SEPARATOR, NON_UNIQUE_INDEX, UNIQUE_INDEX};
use crate::errors::{ErrorKind, NestError, NestResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How an index treats the values it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum IndexKind {
    /// At most one live document per value.
    Unique,
    NonUnique,
    /// Strings are split into words and every remaining word is indexed.
    FullText,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Unique => UNIQUE_INDEX,
            IndexKind::NonUnique => NON_UNIQUE_INDEX,
            IndexKind::FullText => FULL_TEXT_INDEX,
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = NestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            UNIQUE_INDEX => Ok(IndexKind::Unique),
            NON_UNIQUE_INDEX => Ok(IndexKind::NonUnique),
            FULL_TEXT_INDEX => Ok(IndexKind::FullText),
            other => {
                log::error!("Unknown index kind {}", other);
                Err(NestError::new(
                    &format!("Unknown index kind {}", other),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }
}

/// Definition of one index: which collection, which field path and what kind.
///
/// Descriptors are persisted in the index catalog so a reopened store knows
/// every index and its write-time rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct IndexDescriptor {
    collection: String,
    path: String,
    kind: IndexKind,
}

impl IndexDescriptor {
    pub fn new(collection: &str, path: &str, kind: IndexKind) -> Self {
        IndexDescriptor {
            collection: collection.to_string(),
            path: path.to_string(),
            kind,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Name of the map holding this index's entries, derived from the
    /// descriptor alone.
    pub fn map_name(&self) -> String {
        index_map_name(&self.collection, &self.path, self.kind)
    }

    /// Key of this descriptor in the index catalog.
    pub(crate) fn catalog_key(&self) -> Vec<u8> {
        catalog_key(&self.collection, &self.path)
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} index on {}.{}", self.kind, self.collection, self.path)
    }
}

pub(crate) fn index_map_name(collection: &str, path: &str, kind: IndexKind) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}",
        INDEX_PREFIX,
        collection,
        path,
        kind,
        sep = NAME_SEPARATOR
    )
}

/// Prefix shared by the names of every index map of `collection`.
pub(crate) fn index_map_prefix(collection: &str) -> String {
    format!("{}{sep}{}{sep}", INDEX_PREFIX, collection, sep = NAME_SEPARATOR)
}

pub(crate) fn catalog_key(collection: &str, path: &str) -> Vec<u8> {
    format!("{}{}{}", collection, NAME_SEPARATOR, path).into_bytes()
}

pub(crate) fn catalog_prefix(collection: &str) -> Vec<u8> {
    format!("{}{}", collection, NAME_SEPARATOR).into_bytes()
}
