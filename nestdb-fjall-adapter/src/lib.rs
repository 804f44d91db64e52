//! Durable storage for NestDB on top of the [fjall](https://docs.rs/fjall) LSM
//! engine.
//!
//! Every store map becomes one partition of a single keyspace, and every
//! transaction of the database is written as one fjall batch. Load the engine
//! through [`FjallModule`]:
//!
//! ```rust,no_run
//! use nestdb::nest::Nest;
//! use nestdb_fjall_adapter::FjallModule;
//!
//! let module = FjallModule::with_config().db_path("/tmp/nest").build();
//! let db = Nest::builder().load_module(module).open_or_create().unwrap();
//! ```

mod config;
mod map;
mod module;
mod store;
mod version;
mod wrapper;

pub use config::*;
pub use map::FjallMap;
pub use module::*;
pub use store::FjallStore;
pub use wrapper::FjallAdapterError;
