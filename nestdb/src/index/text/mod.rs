mod language;
mod tokenizer;

pub use language::*;
pub use tokenizer::*;
