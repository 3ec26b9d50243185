//! wordforge: a word-level next-token text generator.
//!
//! Re-exports the workspace crates under one name:
//! - [`vocab`]: vocabulary, tokenizer and training windows
//! - [`predictor`]: the predictor capability plus neural and stub predictors
//! - [`decoding`]: sampling and the decode loop
//! - [`engine`]: model lifecycle, completion and configuration

pub use wordforge_decoding as decoding;
pub use wordforge_engine as engine;
pub use wordforge_predictor as predictor;
pub use wordforge_vocab as vocab;

pub use wordforge_decoding::{CancelFlag, GenerateOptions, GenerationOutput};
pub use wordforge_engine::{EngineConfig, EngineError, TextModel};
pub use wordforge_predictor::FitConfig;
