//! # NestDB - Embedded document store
//!
//! NestDB keeps schema-less documents in named collections, maintains secondary
//! indices over any field path (nested fields included) and maps typed Rust
//! values to documents and back.
//!
//! ## Quick Start
//!
//! ```rust
//! use nestdb::doc;
//! use nestdb::index::{IndexKind, IndexLookup};
//! use nestdb::nest::Nest;
//!
//! let db = Nest::builder().open_or_create().unwrap();
//! let books = db.collection("books").unwrap();
//! books.create_index("title", IndexKind::FullText).unwrap();
//! books.create_index("isbn", IndexKind::Unique).unwrap();
//!
//! books.insert(doc! { isbn: "111", title: "The quick fox" }).unwrap();
//! assert!(books.insert(doc! { isbn: "111", title: "Copy" }).is_err());
//!
//! let hits = books.find_by_index("title", &IndexLookup::text("fox")).unwrap();
//! assert_eq!(hits.len(), 1);
//! db.close().unwrap();
//! ```
//!
//! ## Write path
//!
//! Every write stages the document change and the changes of every affected
//! index into one [`Transaction`](store::Transaction), which reaches the store
//! as a single atomic [`WriteBatch`](store::WriteBatch). A failing write, such
//! as a unique constraint violation on any index, leaves nothing behind.
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, ids and collections
//! - [`common`] - Values, field paths and shared utilities
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Index definitions, lookups and full-text support
//! - [`mapper`] - Conversion between Rust types and documents
//! - [`nest`] - The database handle
//! - [`nest_builder`] - Fluent database configuration
//! - [`nest_config`] - Configuration shared by a database
//! - [`repository`] - Typed repositories
//! - [`store`] - Storage abstraction and the in-memory engine

pub mod collection;
pub mod common;
pub mod errors;
pub mod index;
pub mod mapper;
pub mod nest;
pub mod nest_builder;
pub mod nest_config;
pub mod repository;
pub mod store;

pub use nest::Nest;
pub use nest_builder::NestBuilder;
