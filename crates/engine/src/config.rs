//! Engine configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wordforge_predictor::PredictorShape;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Directory holding the predictor artifact and the vocabulary descriptor.
    pub model_dir: PathBuf,
    pub max_sequence_length: usize,
    pub embedding_dim: usize,
    pub vocab_capacity: usize,
    pub learning_rate: f32,
    /// Seeds predictor initialisation and sampling; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let shape = PredictorShape::standard();
        Self {
            model_dir: PathBuf::from("saved_model"),
            max_sequence_length: shape.max_sequence_length,
            embedding_dim: shape.embedding_dim,
            vocab_capacity: shape.vocab_capacity,
            learning_rate: 0.05,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn shape(&self) -> PredictorShape {
        PredictorShape::new(
            self.vocab_capacity,
            self.max_sequence_length,
            self.embedding_dim,
        )
    }

    pub fn predictor_path(&self) -> PathBuf {
        self.model_dir.join("predictor.safetensors")
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.model_dir.join("vocabulary.json")
    }

    /// Read a JSON config; a missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_slice(&data)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}
