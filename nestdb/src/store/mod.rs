//! Storage abstraction.
//!
//! A store is a set of named, ordered byte maps. Collections, indices and the
//! index catalog each live in their own map. All database writes go through a
//! [`Transaction`], which hands them to the engine as one [`WriteBatch`].
//!
//! Two engines ship with the workspace: [`memory::InMemoryStore`] for ephemeral
//! data and the fjall adapter crate for durable storage.

pub mod memory;
mod nest_map;
mod nest_store;
mod store_module;
mod transaction;
mod write_batch;

pub use nest_map::*;
pub use nest_store::*;
pub use store_module::*;
pub use transaction::*;
pub use write_batch::*;
