//! Secondary indices over document fields.
//!
//! An index is defined by a collection, a field path and an [`IndexKind`].
//! Definitions live in the index catalog of the store, and every index keeps
//! its entries in a map of its own whose name is derived from the definition.
//!
//! # Index kinds
//!
//! - **Unique**: at most one document per value. Documents missing the field,
//!   or holding null, are exempt.
//! - **Non-unique**: any number of documents per value.
//! - **Full-text**: string values are split into words, stop words of the
//!   configured language are dropped, and each remaining word is indexed.
//!
//! Array values are indexed element by element, so a document is found by any
//! of its elements.
//!
//! ```rust,ignore
//! use nestdb::index::{IndexKind, IndexLookup};
//!
//! let books = db.collection("books")?;
//! books.create_index("title", IndexKind::FullText)?;
//! let hits = books.find_by_index("title", &IndexLookup::text("quick fox"))?;
//! ```

mod descriptor;
mod index_manager;
mod lookup;
pub mod text;

pub use descriptor::*;
pub(crate) use index_manager::*;
pub use lookup::*;
