//! Results returned by lifecycle operations.

use serde::{Deserialize, Serialize};
use wordforge_predictor::TrainingMetrics;

/// Outcome of persisting the model. A failed save never aborts the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SaveOutcome {
    Saved,
    Failed { warning: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            SaveOutcome::Saved => None,
            SaveOutcome::Failed { warning } => Some(warning),
        }
    }
}

/// How `load` obtained the model it installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum LoadOutcome {
    /// Predictor artifact and vocabulary were read from disk.
    Restored,
    /// Restoring failed; a fresh predictor and the seed vocabulary were installed.
    Fallback { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub metrics: TrainingMetrics,
    /// Number of (window, label) pairs built from the corpus.
    pub examples: usize,
    pub vocabulary_size: usize,
    pub save: SaveOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub loaded: bool,
    pub vocabulary_size: usize,
    pub max_sequence_length: usize,
    pub embedding_dim: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_outcome_serialization() {
        let json = serde_json::to_string(&SaveOutcome::Saved).unwrap();
        assert!(json.contains("Saved"));

        let failed = SaveOutcome::Failed {
            warning: "disk full".into(),
        };
        assert_eq!(failed.warning(), Some("disk full"));
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("Failed"));
        assert!(json.contains("disk full"));
    }

    #[test]
    fn model_info_uses_camel_case() {
        let info = ModelInfo {
            loaded: true,
            vocabulary_size: 5,
            max_sequence_length: 50,
            embedding_dim: 128,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["vocabularySize"], 5);
        assert_eq!(json["maxSequenceLength"], 50);
        assert_eq!(json["embeddingDim"], 128);
    }
}
