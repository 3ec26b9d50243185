//! Multi-suggestion completion.

use crate::error::EngineError;
use crate::model::TextModel;
use wordforge_decoding::GenerateOptions;

pub const SUGGESTION_MAX_LENGTH: usize = 20;
pub const SUGGESTION_TOP_K: usize = 40;

/// Options for suggestion `index`: temperature climbs by 0.1 from 0.7.
pub fn suggestion_options(index: usize) -> GenerateOptions {
    GenerateOptions {
        max_length: SUGGESTION_MAX_LENGTH,
        temperature: 0.7 + index as f32 * 0.1,
        top_k: SUGGESTION_TOP_K,
        cancel: None,
    }
}

impl TextModel {
    /// Generate `n` continuations of `text`, one per temperature step.
    ///
    /// Every suggestion is decoded against the same snapshot, so a concurrent
    /// `train` cannot mix models within one call.
    pub async fn complete(&self, text: &str, n: usize) -> Result<Vec<String>, EngineError> {
        let snapshot = self.snapshot();
        let mut suggestions = Vec::with_capacity(n);
        for index in 0..n {
            let output = self
                .generate_with(&snapshot, text, suggestion_options(index))
                .await?;
            suggestions.push(output.text);
        }
        Ok(suggestions)
    }
}
