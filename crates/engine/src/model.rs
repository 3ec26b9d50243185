//! Model lifecycle: load-or-create, training, persistence and generation.
//!
//! The vocabulary and predictor live in an immutable [`ModelSnapshot`].
//! Generation captures the current snapshot once and uses it for the whole
//! request. `train` and `load` are serialised by a write lock and publish a
//! new snapshot atomically when they succeed, so an in-flight request never
//! sees a vocabulary that does not belong to its predictor. `save` takes the
//! same lock, so the files on disk always come from a single snapshot.

use crate::config::EngineConfig;
use crate::descriptor::VocabularyDescriptor;
use crate::error::EngineError;
use crate::report::{LoadOutcome, ModelInfo, SaveOutcome, TrainingReport};
use anyhow::{ensure, Context, Result};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};
use wordforge_decoding::{Decoder, GenerateOptions, GenerationOutput};
use wordforge_predictor::{
    FitConfig, NeuralRuntime, PredictorRuntime, PredictorShape, SequencePredictor,
};
use wordforge_vocab::{build_dataset, Vocabulary};

/// Corpus used to build a vocabulary when no persisted model can be restored.
pub const SEED_CORPUS: [&str; 7] = [
    "olá como vai você hoje",
    "o que você quer fazer",
    "vamos criar algo incrível",
    "inteligência artificial é fascinante",
    "machine learning e deep learning",
    "processamento de linguagem natural",
    "este é um exemplo de texto",
];

pub struct ModelSnapshot {
    pub vocabulary: Arc<Vocabulary>,
    pub predictor: Option<Arc<dyn SequencePredictor>>,
    pub shape: PredictorShape,
}

impl ModelSnapshot {
    fn unloaded(shape: PredictorShape) -> Self {
        Self {
            vocabulary: Arc::new(Vocabulary::empty()),
            predictor: None,
            shape,
        }
    }

    fn new(vocabulary: Vocabulary, predictor: Box<dyn SequencePredictor>) -> Self {
        Self {
            vocabulary: Arc::new(vocabulary),
            shape: *predictor.shape(),
            predictor: Some(Arc::from(predictor)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.predictor.is_some()
    }
}

pub struct TextModel {
    config: EngineConfig,
    runtime: Arc<dyn PredictorRuntime>,
    state: ArcSwap<ModelSnapshot>,
    write_lock: tokio::sync::Mutex<()>,
    rng: Mutex<fastrand::Rng>,
}

impl TextModel {
    pub fn new(config: EngineConfig, runtime: Arc<dyn PredictorRuntime>) -> Self {
        let rng = config
            .seed
            .map(fastrand::Rng::with_seed)
            .unwrap_or_else(fastrand::Rng::new);
        Self {
            state: ArcSwap::from_pointee(ModelSnapshot::unloaded(config.shape())),
            config,
            runtime,
            write_lock: tokio::sync::Mutex::new(()),
            rng: Mutex::new(rng),
        }
    }

    /// Model backed by [`NeuralRuntime`] configured from `config`.
    pub fn with_neural_runtime(config: EngineConfig) -> Self {
        let runtime = NeuralRuntime::new(config.learning_rate, config.seed);
        Self::new(config, Arc::new(runtime))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The snapshot new requests will use.
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.state.load_full()
    }

    pub fn info(&self) -> ModelInfo {
        let snapshot = self.snapshot();
        ModelInfo {
            loaded: snapshot.is_loaded(),
            vocabulary_size: snapshot.vocabulary.len(),
            max_sequence_length: snapshot.shape.max_sequence_length,
            embedding_dim: snapshot.shape.embedding_dim,
        }
    }

    /// Restore the persisted model, or install a fresh one when that fails.
    ///
    /// Only a failure to build the fresh model is returned as an error.
    pub async fn load(&self) -> Result<LoadOutcome, EngineError> {
        let _guard = self.write_lock.lock().await;

        match self.restore().await {
            Ok(snapshot) => {
                info!(
                    vocabulary_size = snapshot.vocabulary.len(),
                    predictor = snapshot.predictor.as_ref().map(|p| p.name()),
                    dir = %self.config.model_dir.display(),
                    "model restored from disk"
                );
                self.state.store(Arc::new(snapshot));
                Ok(LoadOutcome::Restored)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "could not restore model, creating a new one");
                let snapshot = self.fresh_snapshot().map_err(EngineError::FatalInit)?;
                info!(
                    vocabulary_size = snapshot.vocabulary.len(),
                    "new model created from seed corpus"
                );
                self.state.store(Arc::new(snapshot));
                Ok(LoadOutcome::Fallback {
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    async fn restore(&self) -> Result<ModelSnapshot> {
        let descriptor =
            VocabularyDescriptor::load_from_file(&self.config.vocabulary_path()).await?;
        let vocabulary = descriptor
            .to_vocabulary()
            .context("vocabulary descriptor is inconsistent")?;
        let shape = descriptor.shape(self.config.embedding_dim);
        ensure!(
            shape == self.config.shape(),
            "persisted shape {:?} does not match configured shape {:?}",
            shape,
            self.config.shape()
        );

        let runtime = Arc::clone(&self.runtime);
        let path = self.config.predictor_path();
        let predictor = tokio::task::spawn_blocking(move || runtime.load(&path, &shape))
            .await
            .context("predictor load task failed")??;

        Ok(ModelSnapshot::new(vocabulary, predictor))
    }

    fn fresh_snapshot(&self) -> Result<ModelSnapshot> {
        let shape = self.config.shape();
        let predictor = self.runtime.create(&shape)?;
        let vocabulary = Vocabulary::build(&SEED_CORPUS, shape.vocab_capacity);
        Ok(ModelSnapshot::new(vocabulary, predictor))
    }

    /// Persist the current model. Failures are reported, not raised.
    pub async fn save(&self) -> SaveOutcome {
        let _guard = self.write_lock.lock().await;
        self.persist(&self.snapshot()).await
    }

    async fn persist(&self, snapshot: &ModelSnapshot) -> SaveOutcome {
        match self.try_persist(snapshot).await {
            Ok(()) => {
                info!(dir = %self.config.model_dir.display(), "model and vocabulary saved");
                SaveOutcome::Saved
            }
            Err(e) => {
                let warning = format!("{:#}", e);
                warn!(error = %warning, "failed to save model");
                SaveOutcome::Failed { warning }
            }
        }
    }

    async fn try_persist(&self, snapshot: &ModelSnapshot) -> Result<()> {
        let predictor = snapshot
            .predictor
            .clone()
            .context("no predictor to save")?;

        let path = self.config.predictor_path();
        tokio::task::spawn_blocking(move || predictor.save(&path))
            .await
            .context("predictor save task failed")??;

        VocabularyDescriptor::new(&snapshot.vocabulary, &snapshot.shape)
            .save_to_file(&self.config.vocabulary_path())
            .await
    }

    /// Rebuild the vocabulary from `texts`, fit the predictor and persist.
    ///
    /// The new vocabulary replaces the old one entirely. Nothing changes when
    /// any step before persisting fails; a failed save is reported in
    /// [`TrainingReport::save`].
    pub async fn train<S>(&self, texts: &[S], options: FitConfig) -> Result<TrainingReport, EngineError>
    where
        S: AsRef<str> + Sync,
    {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot();

        let mut predictor = match &current.predictor {
            Some(predictor) => predictor.clone_box(),
            None => self
                .runtime
                .create(&current.shape)
                .map_err(EngineError::TrainingFailed)?,
        };
        let shape = *predictor.shape();

        let vocabulary = Vocabulary::build(texts, shape.vocab_capacity);
        let dataset = build_dataset(&vocabulary, texts, shape.max_sequence_length);
        let examples = dataset.len();
        info!(
            texts = texts.len(),
            vocabulary_size = vocabulary.len(),
            examples,
            epochs = options.epochs,
            "training started"
        );

        let (predictor, metrics) = tokio::task::spawn_blocking(move || {
            let metrics = predictor.fit(&dataset, &options)?;
            Ok::<_, anyhow::Error>((predictor, metrics))
        })
        .await
        .context("training task failed")
        .and_then(|fitted| fitted)
        .map_err(EngineError::TrainingFailed)?;

        let vocabulary_size = vocabulary.len();
        let snapshot = Arc::new(ModelSnapshot::new(vocabulary, predictor));
        self.state.store(Arc::clone(&snapshot));

        let save = self.persist(&snapshot).await;
        info!(
            final_loss = metrics.final_epoch().map(|m| m.loss),
            saved = save.is_saved(),
            "training finished"
        );

        Ok(TrainingReport {
            metrics,
            examples,
            vocabulary_size,
            save,
        })
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, EngineError> {
        Ok(self.generate(prompt, options).await?.text)
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<GenerationOutput, EngineError> {
        self.generate_with(&self.snapshot(), prompt, options).await
    }

    pub(crate) async fn generate_with(
        &self,
        snapshot: &ModelSnapshot,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<GenerationOutput, EngineError> {
        let predictor = snapshot.predictor.clone().ok_or(EngineError::NotReady)?;
        options.validate().map_err(EngineError::InvalidOptions)?;

        let decoder = Decoder::new(
            Arc::clone(&snapshot.vocabulary),
            predictor,
            prompt,
            options,
            self.request_rng(),
        );
        decoder.run().await.map_err(EngineError::Predictor)
    }

    /// Independent RNG for one request, derived from the model's RNG.
    fn request_rng(&self) -> fastrand::Rng {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        fastrand::Rng::with_seed(rng.u64(..))
    }
}
