mod constants;
mod field_path;
mod field_value;
pub(crate) mod key_codec;
pub(crate) mod serializer;
mod type_utils;
mod value;

pub use constants::*;
pub use field_path::*;
pub use field_value::*;
pub use type_utils::*;
pub use value::*;
