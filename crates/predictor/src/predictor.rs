//! The sequence-predictor capability consumed by the decoding engine.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use wordforge_vocab::Dataset;

/// Dimensions a predictor is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorShape {
    /// Length of every probability vector returned by `predict`.
    pub vocab_capacity: usize,
    /// Window width `W` accepted by `predict`.
    pub max_sequence_length: usize,
    pub embedding_dim: usize,
}

impl PredictorShape {
    pub fn new(vocab_capacity: usize, max_sequence_length: usize, embedding_dim: usize) -> Self {
        Self {
            vocab_capacity,
            max_sequence_length,
            embedding_dim,
        }
    }

    /// Shape used by a freshly initialised model.
    pub fn standard() -> Self {
        Self::new(10_000, 50, 128)
    }

    /// Tiny shape for quick tests.
    pub fn tiny() -> Self {
        Self::new(32, 4, 8)
    }
}

impl Default for PredictorShape {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of examples, taken from the end, held out for validation.
    pub validation_split: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            validation_split: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f32>,
}

/// Per-epoch history returned by [`SequencePredictor::fit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub history: Vec<EpochMetrics>,
}

impl TrainingMetrics {
    pub fn final_epoch(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

/// Next-token predictor over fixed-width windows of token ids.
pub trait SequencePredictor: Send + Sync {
    fn name(&self) -> &'static str;

    fn shape(&self) -> &PredictorShape;

    /// Probability vector of length `shape().vocab_capacity` for the token
    /// following `window`.
    fn predict(&self, window: &[usize]) -> Result<Vec<f32>>;

    fn fit(&mut self, dataset: &Dataset, config: &FitConfig) -> Result<TrainingMetrics>;

    /// Persist the predictor artifact at `path`.
    fn save(&self, path: &Path) -> Result<()>;

    fn clone_box(&self) -> Box<dyn SequencePredictor>;
}

impl Clone for Box<dyn SequencePredictor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Constructs and restores predictors of one kind.
pub trait PredictorRuntime: Send + Sync {
    fn create(&self, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>>;

    /// Restore an artifact written by [`SequencePredictor::save`]. Fails when
    /// the artifact does not match `shape`.
    fn load(&self, path: &Path, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>>;
}
