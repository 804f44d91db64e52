//! Documents, identifiers and collections.
//!
//! A [`Document`] is an ordered map from field names to [`Value`](crate::common::Value)s.
//! Nested fields are addressed with dotted paths (`address.city`) and array
//! elements with numeric segments (`tags.0` or `tags[0]`).
//!
//! ```rust
//! use nestdb::doc;
//!
//! let mut doc = doc! { name: "Alice", address: { city: "Paris" } };
//! doc.put("address.zip", 75001).unwrap();
//! assert_eq!(doc.get("address.city"), Some(nestdb::val!("Paris")));
//! assert_eq!(doc.get("address.street"), None);
//! ```
//!
//! A [`NestCollection`] stores documents under a [`NestId`] kept in the
//! reserved `_id` field. Ids are assigned on first insertion and never change.

mod collection_factory;
mod document;
mod nest_collection;
mod nest_id;
pub(crate) mod snowflake;

pub(crate) use collection_factory::*;
pub use document::*;
pub use nest_collection::*;
pub use nest_id::*;
