//! Reference numeric predictor: bag-of-embeddings context fed to a softmax head.
//!
//! The context vector is the mean embedding of the non-padding positions of
//! the window. Training is plain mini-batch SGD on cross-entropy.

use crate::predictor::{
    EpochMetrics, FitConfig, PredictorRuntime, PredictorShape, SequencePredictor,
    TrainingMetrics,
};
use crate::weights::NeuralWeights;
use anyhow::{bail, ensure, Result};
use ndarray::linalg::general_mat_mul;
use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use wordforge_vocab::{Dataset, PAD};

#[derive(Debug, Clone)]
pub struct NeuralPredictor {
    shape: PredictorShape,
    weights: NeuralWeights,
    learning_rate: f32,
    rng: fastrand::Rng,
}

struct Forward {
    context: Array1<f32>,
    positions: Vec<usize>,
    probs: Array1<f32>,
}

#[derive(Default)]
struct Tally {
    loss: f64,
    correct: usize,
    seen: usize,
}

impl Tally {
    fn record(&mut self, probs: &Array1<f32>, label: usize) {
        self.loss -= f64::from(probs[label].max(1e-12)).ln();
        if argmax(probs) == label {
            self.correct += 1;
        }
        self.seen += 1;
    }

    fn loss(&self) -> f32 {
        (self.loss / self.seen.max(1) as f64) as f32
    }

    fn accuracy(&self) -> f32 {
        self.correct as f32 / self.seen.max(1) as f32
    }
}

impl NeuralPredictor {
    pub fn new(shape: PredictorShape, learning_rate: f32, mut rng: fastrand::Rng) -> Self {
        let weights = NeuralWeights::random(&shape, &mut rng);
        Self::from_weights(shape, weights, learning_rate, rng)
    }

    pub fn from_weights(
        shape: PredictorShape,
        weights: NeuralWeights,
        learning_rate: f32,
        rng: fastrand::Rng,
    ) -> Self {
        Self {
            shape,
            weights,
            learning_rate,
            rng,
        }
    }

    pub fn weights(&self) -> &NeuralWeights {
        &self.weights
    }

    fn validate_window(&self, window: &[usize]) -> Result<()> {
        ensure!(
            window.len() == self.shape.max_sequence_length,
            "window has {} ids, predictor expects {}",
            window.len(),
            self.shape.max_sequence_length
        );
        if let Some(&id) = window.iter().find(|&&id| id >= self.shape.vocab_capacity) {
            bail!(
                "token id {} outside vocabulary capacity {}",
                id,
                self.shape.vocab_capacity
            );
        }
        Ok(())
    }

    fn forward(&self, window: &[usize]) -> Forward {
        let positions: Vec<usize> = window.iter().copied().filter(|&id| id != PAD).collect();

        let mut context = Array1::<f32>::zeros(self.shape.embedding_dim);
        for &id in &positions {
            context += &self.weights.embedding.row(id);
        }
        if !positions.is_empty() {
            context /= positions.len() as f32;
        }

        let mut logits = context.dot(&self.weights.head_weight);
        logits += &self.weights.head_bias.row(0);
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        logits.mapv_inplace(|x| (x - max).exp());
        let sum = logits.sum();
        logits /= sum.max(f32::EPSILON);

        Forward {
            context,
            positions,
            probs: logits,
        }
    }

    fn train_batch(&mut self, dataset: &Dataset, batch: &[usize], tally: &mut Tally) {
        let (vocab, dim) = (self.shape.vocab_capacity, self.shape.embedding_dim);
        let mut grad_head = Array2::<f32>::zeros((dim, vocab));
        let mut grad_bias = Array1::<f32>::zeros(vocab);
        let mut grad_embedding: HashMap<usize, Array1<f32>> = HashMap::new();

        for &idx in batch {
            let label = dataset.labels[idx];
            let Forward {
                context,
                positions,
                probs,
            } = self.forward(&dataset.windows[idx]);
            tally.record(&probs, label);

            let mut delta = probs;
            delta[label] -= 1.0;

            let context_col = context.view().insert_axis(Axis(1));
            let delta_row = delta.view().insert_axis(Axis(0));
            general_mat_mul(1.0, &context_col, &delta_row, 1.0, &mut grad_head);
            grad_bias += &delta;

            if positions.is_empty() {
                continue;
            }
            let mut grad_context = self.weights.head_weight.dot(&delta);
            grad_context /= positions.len() as f32;
            for id in positions {
                grad_embedding
                    .entry(id)
                    .and_modify(|g| *g += &grad_context)
                    .or_insert_with(|| grad_context.clone());
            }
        }

        let step = self.learning_rate / batch.len() as f32;
        self.weights.head_weight.scaled_add(-step, &grad_head);
        self.weights
            .head_bias
            .row_mut(0)
            .scaled_add(-step, &grad_bias);
        for (id, grad) in grad_embedding {
            self.weights.embedding.row_mut(id).scaled_add(-step, &grad);
        }
    }
}

impl SequencePredictor for NeuralPredictor {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn shape(&self) -> &PredictorShape {
        &self.shape
    }

    fn predict(&self, window: &[usize]) -> Result<Vec<f32>> {
        self.validate_window(window)?;
        Ok(self.forward(window).probs.to_vec())
    }

    fn fit(&mut self, dataset: &Dataset, config: &FitConfig) -> Result<TrainingMetrics> {
        ensure!(
            dataset.windows.len() == dataset.labels.len(),
            "{} windows but {} labels",
            dataset.windows.len(),
            dataset.labels.len()
        );
        ensure!(
            (0.0..1.0).contains(&config.validation_split),
            "validation split {} must be in [0, 1)",
            config.validation_split
        );
        for (window, &label) in dataset.windows.iter().zip(&dataset.labels) {
            self.validate_window(window)?;
            ensure!(
                label < self.shape.vocab_capacity,
                "label {} outside vocabulary capacity {}",
                label,
                self.shape.vocab_capacity
            );
        }

        let total = dataset.len();
        let held_out = (total as f32 * config.validation_split) as usize;
        let train_len = total - held_out;
        if train_len == 0 {
            bail!("no training examples ({} total, {} held out)", total, held_out);
        }

        let batch_size = config.batch_size.max(1);
        let mut order: Vec<usize> = (0..train_len).collect();
        let mut metrics = TrainingMetrics::default();

        for epoch in 1..=config.epochs {
            self.rng.shuffle(&mut order);

            let mut train = Tally::default();
            for batch in order.chunks(batch_size) {
                self.train_batch(dataset, batch, &mut train);
            }

            let (val_loss, val_accuracy) = if held_out > 0 {
                let mut val = Tally::default();
                for idx in train_len..total {
                    val.record(&self.forward(&dataset.windows[idx]).probs, dataset.labels[idx]);
                }
                (Some(val.loss()), Some(val.accuracy()))
            } else {
                (None, None)
            };

            let epoch_metrics = EpochMetrics {
                epoch,
                loss: train.loss(),
                accuracy: train.accuracy(),
                val_loss,
                val_accuracy,
            };
            info!(
                epoch,
                loss = epoch_metrics.loss,
                accuracy = epoch_metrics.accuracy,
                val_loss = ?epoch_metrics.val_loss,
                "epoch finished"
            );
            metrics.history.push(epoch_metrics);
        }

        debug!(examples = total, held_out, "fit completed");
        Ok(metrics)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.weights.save_safetensors(path)
    }

    fn clone_box(&self) -> Box<dyn SequencePredictor> {
        Box::new(self.clone())
    }
}

fn argmax(values: &Array1<f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (idx, &value)| {
            if value > best.1 {
                (idx, value)
            } else {
                best
            }
        })
        .0
}

/// Runtime producing [`NeuralPredictor`]s.
#[derive(Debug, Clone)]
pub struct NeuralRuntime {
    pub learning_rate: f32,
    /// Seed for weight initialisation and shuffling; entropy when `None`.
    pub seed: Option<u64>,
}

impl NeuralRuntime {
    pub fn new(learning_rate: f32, seed: Option<u64>) -> Self {
        Self {
            learning_rate,
            seed,
        }
    }

    fn rng(&self) -> fastrand::Rng {
        self.seed
            .map(fastrand::Rng::with_seed)
            .unwrap_or_else(fastrand::Rng::new)
    }
}

impl Default for NeuralRuntime {
    fn default() -> Self {
        Self::new(0.05, None)
    }
}

impl PredictorRuntime for NeuralRuntime {
    fn create(&self, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>> {
        ensure!(
            shape.vocab_capacity > 0 && shape.embedding_dim > 0,
            "degenerate predictor shape {:?}",
            shape
        );
        Ok(Box::new(NeuralPredictor::new(
            *shape,
            self.learning_rate,
            self.rng(),
        )))
    }

    fn load(&self, path: &Path, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>> {
        let weights = NeuralWeights::load_safetensors(path, shape)?;
        Ok(Box::new(NeuralPredictor::from_weights(
            *shape,
            weights,
            self.learning_rate,
            self.rng(),
        )))
    }
}
