//! Vocabulary, tokenizer and training-window generation for wordforge.

pub mod tokenizer;
pub mod vocabulary;
pub mod windows;

pub use tokenizer::split_words;
pub use vocabulary::*;
pub use windows::*;
