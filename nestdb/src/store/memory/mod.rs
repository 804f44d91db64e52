mod map;
mod module;
mod store;

pub use map::*;
pub use module::*;
pub use store::*;
