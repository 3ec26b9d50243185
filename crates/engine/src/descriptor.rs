//! Persisted vocabulary descriptor stored next to the predictor artifact.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wordforge_predictor::PredictorShape;
use wordforge_vocab::{Vocabulary, VocabularyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyDescriptor {
    /// `[word, id]` pairs.
    pub vocabulary: Vec<(String, usize)>,
    /// `[id, word]` pairs.
    pub reverse_vocabulary: Vec<(usize, String)>,
    pub max_sequence_length: usize,
    #[serde(alias = "vocabSize")]
    pub vocab_capacity: usize,
}

impl VocabularyDescriptor {
    pub fn new(vocab: &Vocabulary, shape: &PredictorShape) -> Self {
        Self {
            vocabulary: vocab.forward_pairs(),
            reverse_vocabulary: vocab.reverse_pairs(),
            max_sequence_length: shape.max_sequence_length,
            vocab_capacity: shape.vocab_capacity,
        }
    }

    pub fn to_vocabulary(&self) -> Result<Vocabulary, VocabularyError> {
        Vocabulary::from_pairs(self.vocabulary.clone(), self.reverse_vocabulary.clone())
    }

    /// Predictor shape implied by the descriptor.
    pub fn shape(&self, embedding_dim: usize) -> PredictorShape {
        PredictorShape::new(self.vocab_capacity, self.max_sequence_length, embedding_dim)
    }

    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        let descriptor: Self = serde_json::from_slice(&data)
            .with_context(|| format!("malformed vocabulary {}", path.display()))?;

        ensure!(
            descriptor.max_sequence_length > 0,
            "vocabulary descriptor has zero maxSequenceLength"
        );
        if let Some((word, id)) = descriptor
            .vocabulary
            .iter()
            .find(|(_, id)| *id >= descriptor.vocab_capacity)
        {
            anyhow::bail!(
                "word {:?} has id {} beyond capacity {}",
                word,
                id,
                descriptor.vocab_capacity
            );
        }
        Ok(descriptor)
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let blob = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, blob)
            .await
            .with_context(|| format!("failed to write vocabulary {}", path.display()))?;
        Ok(())
    }
}
