//! Sequence predictors for wordforge.
//!
//! The decoding engine only sees the [`SequencePredictor`] capability and a
//! [`PredictorRuntime`] that builds or restores predictors. Two kinds ship
//! here:
//! - [`NeuralPredictor`]: embedding + softmax head trained with SGD, stored
//!   as safetensors
//! - [`StubPredictor`]: scripted, deterministic output for tests

pub mod neural;
pub mod predictor;
pub mod stub;
pub mod weights;

pub use neural::{NeuralPredictor, NeuralRuntime};
pub use predictor::*;
pub use stub::{StubBehavior, StubCounters, StubPredictor, StubRuntime};
pub use weights::NeuralWeights;
