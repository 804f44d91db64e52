//! Typed repositories.
//!
//! An [`ObjectRepository`] stores values of one [`Convertible`](crate::mapper::Convertible)
//! type in a collection named after the type. The values are converted through
//! the database's mapper, so indices address the fields the type writes.
//!
//! ```rust,ignore
//! let books = db.repository::<Book>()?;
//! books.create_index("isbn", IndexKind::Unique)?;
//! let id = books.insert(&book)?;
//! let stored: Option<Book> = books.get_by_id(&id)?;
//! ```

mod object_repository;

pub use object_repository::*;
