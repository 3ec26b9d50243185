//! Deterministic predictor for exercising the decoding engine without a model.

use crate::predictor::{
    EpochMetrics, FitConfig, PredictorRuntime, PredictorShape, SequencePredictor,
    TrainingMetrics,
};
use anyhow::{bail, ensure, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wordforge_vocab::{Dataset, PAD};

const ARTIFACT_MAGIC: &str = "wordforge-stub";

#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Return the scripted vectors in order, cycling when exhausted.
    Script(Arc<Vec<Vec<f32>>>),
    /// Put all mass on the id following the last non-padding id of the window.
    Successor,
}

/// Counters shared by a stub and all of its clones.
#[derive(Debug, Default)]
pub struct StubCounters {
    pub predict_calls: AtomicUsize,
    pub fit_calls: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct StubPredictor {
    shape: PredictorShape,
    behavior: StubBehavior,
    counters: Arc<StubCounters>,
    fail_fit: bool,
    fail_save: bool,
}

impl StubPredictor {
    pub fn new(shape: PredictorShape, behavior: StubBehavior) -> Self {
        Self {
            shape,
            behavior,
            counters: Arc::new(StubCounters::default()),
            fail_fit: false,
            fail_save: false,
        }
    }

    pub fn scripted(shape: PredictorShape, script: Vec<Vec<f32>>) -> Self {
        Self::new(shape, StubBehavior::Script(Arc::new(script)))
    }

    pub fn successor(shape: PredictorShape) -> Self {
        Self::new(shape, StubBehavior::Successor)
    }

    pub fn with_failing_fit(mut self) -> Self {
        self.fail_fit = true;
        self
    }

    pub fn with_failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn counters(&self) -> Arc<StubCounters> {
        Arc::clone(&self.counters)
    }

    /// Distribution with all mass on `id`.
    pub fn one_hot(capacity: usize, id: usize) -> Vec<f32> {
        let mut probs = vec![0.0; capacity];
        if let Some(slot) = probs.get_mut(id) {
            *slot = 1.0;
        }
        probs
    }
}

impl SequencePredictor for StubPredictor {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn shape(&self) -> &PredictorShape {
        &self.shape
    }

    fn predict(&self, window: &[usize]) -> Result<Vec<f32>> {
        ensure!(
            window.len() == self.shape.max_sequence_length,
            "window has {} ids, predictor expects {}",
            window.len(),
            self.shape.max_sequence_length
        );
        let call = self.counters.predict_calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            StubBehavior::Script(script) => {
                if script.is_empty() {
                    bail!("stub script is empty");
                }
                Ok(script[call % script.len()].clone())
            }
            StubBehavior::Successor => {
                let last = window.iter().rev().find(|&&id| id != PAD).copied();
                let next = last.map_or(0, |id| id + 1) % self.shape.vocab_capacity.max(1);
                Ok(Self::one_hot(self.shape.vocab_capacity, next))
            }
        }
    }

    fn fit(&mut self, dataset: &Dataset, config: &FitConfig) -> Result<TrainingMetrics> {
        self.counters.fit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fit {
            bail!("stub configured to fail fit");
        }
        ensure!(!dataset.is_empty(), "no training examples");

        let history = (1..=config.epochs)
            .map(|epoch| EpochMetrics {
                epoch,
                loss: 1.0 / epoch as f32,
                accuracy: 0.0,
                val_loss: None,
                val_accuracy: None,
            })
            .collect();
        Ok(TrainingMetrics { history })
    }

    fn save(&self, path: &Path) -> Result<()> {
        if self.fail_save {
            bail!("stub configured to fail save");
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let shape = self.shape;
        fs::write(
            path,
            format!(
                "{} {} {} {}",
                ARTIFACT_MAGIC, shape.vocab_capacity, shape.max_sequence_length, shape.embedding_dim
            ),
        )?;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn SequencePredictor> {
        Box::new(self.clone())
    }
}

/// Runtime handing out stubs built from a template.
#[derive(Debug, Clone)]
pub struct StubRuntime {
    template: Option<StubPredictor>,
}

impl StubRuntime {
    /// Creates clones of `template`, reshaped to the requested shape.
    pub fn new(template: StubPredictor) -> Self {
        Self {
            template: Some(template),
        }
    }

    /// A runtime that cannot construct anything.
    pub fn broken() -> Self {
        Self { template: None }
    }

    fn instantiate(&self, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>> {
        let template = self
            .template
            .as_ref()
            .context("stub runtime cannot construct predictors")?;
        let mut stub = template.clone();
        stub.shape = *shape;
        Ok(Box::new(stub))
    }
}

impl PredictorRuntime for StubRuntime {
    fn create(&self, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>> {
        self.instantiate(shape)
    }

    fn load(&self, path: &Path, shape: &PredictorShape) -> Result<Box<dyn SequencePredictor>> {
        let blob = fs::read_to_string(path)
            .with_context(|| format!("failed to read stub artifact {}", path.display()))?;
        let fields: Vec<&str> = blob.split_whitespace().collect();
        ensure!(fields.first() == Some(&ARTIFACT_MAGIC), "not a stub artifact");
        let stored: Vec<usize> = fields[1..]
            .iter()
            .map(|field| field.parse::<usize>())
            .collect::<Result<_, _>>()
            .context("malformed stub artifact")?;
        ensure!(
            stored == [shape.vocab_capacity, shape.max_sequence_length, shape.embedding_dim],
            "stub artifact shape {:?} does not match {:?}",
            stored,
            shape
        );
        self.instantiate(shape)
    }
}
