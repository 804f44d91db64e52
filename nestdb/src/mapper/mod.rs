//! Conversion between domain types and documents.
mod convertible;
mod nest_mapper;

pub use convertible::*;
pub use nest_mapper::*;
