//! Error taxonomy surfaced by the engine.

use thiserror::Error;

/// Failures surfaced to callers of [`crate::TextModel`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model not ready: no predictor is loaded")]
    NotReady,
    #[error("invalid generation options: {0}")]
    InvalidOptions(String),
    #[error("training failed: {0:#}")]
    TrainingFailed(anyhow::Error),
    #[error("could not initialise a model: {0:#}")]
    FatalInit(anyhow::Error),
    #[error("predictor failed during generation: {0:#}")]
    Predictor(anyhow::Error),
}
