//! Autoregressive decode loop over a [`SequencePredictor`].

use crate::sampling::{scale_by_temperature, Distribution};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};
use wordforge_predictor::SequencePredictor;
use wordforge_vocab::{context_window, Vocabulary, PAD, UNK};

/// Cooperative cancellation shared between a request and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateOptions {
    /// Upper bound on tokens appended after the prompt.
    pub max_length: usize,
    pub temperature: f32,
    pub top_k: usize,
    #[serde(skip)]
    pub cancel: Option<CancelFlag>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_length: 100,
            temperature: 0.8,
            top_k: 40,
            cancel: None,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(format!(
                "temperature must be a positive finite number, got {}",
                self.temperature
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeState {
    AwaitingPrompt,
    Decoding,
    /// Sampled `<PAD>` or `<UNK>`.
    StoppedByToken,
    /// Appended `max_length` tokens.
    StoppedByLength,
    Cancelled,
}

impl DecodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DecodeState::StoppedByToken | DecodeState::StoppedByLength | DecodeState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetrics {
    pub decode_ms: f64,
    pub tokens_generated: usize,
    pub tokens_per_sec: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub text: String,
    /// Prompt ids followed by every sampled id.
    pub tokens: Vec<usize>,
    pub prompt_len: usize,
    pub state: DecodeState,
    pub metrics: GenerationMetrics,
}

impl GenerationOutput {
    pub fn generated(&self) -> &[usize] {
        &self.tokens[self.prompt_len..]
    }
}

/// One generation request: owns the buffer, the RNG and the current state.
pub struct Decoder {
    vocab: Arc<Vocabulary>,
    predictor: Arc<dyn SequencePredictor>,
    options: GenerateOptions,
    rng: fastrand::Rng,
    buffer: Vec<usize>,
    prompt_len: usize,
    steps: usize,
    state: DecodeState,
}

impl Decoder {
    pub fn new(
        vocab: Arc<Vocabulary>,
        predictor: Arc<dyn SequencePredictor>,
        prompt: &str,
        options: GenerateOptions,
        rng: fastrand::Rng,
    ) -> Self {
        let buffer = vocab.tokenize(prompt);
        let prompt_len = buffer.len();
        Self {
            vocab,
            predictor,
            options,
            rng,
            buffer,
            prompt_len,
            steps: 0,
            state: DecodeState::AwaitingPrompt,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn buffer(&self) -> &[usize] {
        &self.buffer
    }

    /// Advance by at most one token and return the resulting state.
    pub async fn step(&mut self) -> Result<DecodeState> {
        match self.state {
            DecodeState::AwaitingPrompt => self.state = DecodeState::Decoding,
            DecodeState::Decoding => {}
            terminal => return Ok(terminal),
        }

        if self.options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            self.state = DecodeState::Cancelled;
            return Ok(self.state);
        }
        if self.steps >= self.options.max_length {
            self.state = DecodeState::StoppedByLength;
            return Ok(self.state);
        }

        let shape = *self.predictor.shape();
        let window = context_window(&self.buffer, shape.max_sequence_length);
        let predictor = Arc::clone(&self.predictor);
        let probs = tokio::task::spawn_blocking(move || predictor.predict(&window))
            .await
            .context("predictor task failed")??;
        ensure!(
            probs.len() == shape.vocab_capacity,
            "predictor returned {} probabilities, expected {}",
            probs.len(),
            shape.vocab_capacity
        );

        let next = {
            let scaled = scale_by_temperature(&probs, self.options.temperature);
            Distribution::top_k(&scaled, self.options.top_k).sample(&mut self.rng)
        };
        trace!(step = self.steps, token = next, "sampled token");

        self.buffer.push(next);
        self.steps += 1;

        if next == PAD || next == UNK {
            self.state = DecodeState::StoppedByToken;
        } else if self.steps >= self.options.max_length {
            self.state = DecodeState::StoppedByLength;
        }
        Ok(self.state)
    }

    /// Decode until a terminal state and detokenize the whole buffer.
    pub async fn run(mut self) -> Result<GenerationOutput> {
        let start = Instant::now();
        while !self.step().await?.is_terminal() {}
        let decode_ms = start.elapsed().as_secs_f64() * 1000.0;

        let tokens_per_sec = if decode_ms > 0.0 {
            (self.steps as f64 / decode_ms) * 1000.0
        } else {
            0.0
        };

        debug!(
            prompt_tokens = self.prompt_len,
            generated = self.steps,
            state = ?self.state,
            decode_ms,
            "generation finished"
        );

        Ok(GenerationOutput {
            text: self.vocab.detokenize(&self.buffer),
            tokens: self.buffer,
            prompt_len: self.prompt_len,
            state: self.state,
            metrics: GenerationMetrics {
                decode_ms,
                tokens_generated: self.steps,
                tokens_per_sec,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordforge_predictor::{PredictorShape, StubPredictor};

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::build(&["a b c d e f g"], 16))
    }

    fn greedy(max_length: usize) -> GenerateOptions {
        GenerateOptions {
            max_length,
            top_k: 1,
            ..GenerateOptions::default()
        }
    }

    #[tokio::test]
    async fn stops_after_max_length() {
        let stub = StubPredictor::successor(PredictorShape::new(16, 3, 1));
        let decoder = Decoder::new(vocab(), Arc::new(stub), "a", greedy(3), fastrand::Rng::with_seed(1));

        let output = decoder.run().await.unwrap();
        assert_eq!(output.state, DecodeState::StoppedByLength);
        assert_eq!(output.tokens, vec![3, 4, 5, 6]);
        assert_eq!(output.generated(), &[4, 5, 6]);
        assert_eq!(output.text, "a b c d");
    }

    #[tokio::test]
    async fn stops_on_unk_and_keeps_it_in_the_text() {
        let shape = PredictorShape::new(16, 3, 1);
        let script = vec![
            StubPredictor::one_hot(16, 4),
            StubPredictor::one_hot(16, UNK),
            StubPredictor::one_hot(16, 5),
        ];
        let stub = StubPredictor::scripted(shape, script);
        let counters = stub.counters();
        let decoder = Decoder::new(vocab(), Arc::new(stub), "a", greedy(10), fastrand::Rng::with_seed(1));

        let output = decoder.run().await.unwrap();
        assert_eq!(output.state, DecodeState::StoppedByToken);
        assert_eq!(output.tokens, vec![3, 4, UNK]);
        assert_eq!(output.text, "a b <UNK>");
        assert_eq!(counters.predict_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_on_pad_and_hides_it() {
        let stub = StubPredictor::scripted(
            PredictorShape::new(16, 3, 1),
            vec![StubPredictor::one_hot(16, PAD)],
        );
        let decoder = Decoder::new(vocab(), Arc::new(stub), "a b", greedy(10), fastrand::Rng::with_seed(1));

        let output = decoder.run().await.unwrap();
        assert_eq!(output.state, DecodeState::StoppedByToken);
        assert_eq!(output.tokens, vec![3, 4, PAD]);
        assert_eq!(output.text, "a b");
    }

    #[tokio::test]
    async fn zero_max_length_never_calls_the_predictor() {
        let stub = StubPredictor::successor(PredictorShape::new(16, 3, 1));
        let counters = stub.counters();
        let decoder = Decoder::new(vocab(), Arc::new(stub), "a", greedy(0), fastrand::Rng::with_seed(1));

        let output = decoder.run().await.unwrap();
        assert_eq!(output.state, DecodeState::StoppedByLength);
        assert_eq!(output.tokens, vec![3]);
        assert_eq!(counters.predict_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_each_step() {
        let stub = StubPredictor::successor(PredictorShape::new(16, 3, 1));
        let cancel = CancelFlag::new();
        let options = GenerateOptions {
            cancel: Some(cancel.clone()),
            ..greedy(10)
        };
        let mut decoder = Decoder::new(vocab(), Arc::new(stub), "a", options, fastrand::Rng::with_seed(1));

        assert_eq!(decoder.step().await.unwrap(), DecodeState::Decoding);
        cancel.cancel();
        assert_eq!(decoder.step().await.unwrap(), DecodeState::Cancelled);
        assert_eq!(decoder.buffer(), &[3, 4]);
    }

    #[tokio::test]
    async fn rejects_wrongly_sized_predictions() {
        let stub = StubPredictor::scripted(PredictorShape::new(16, 3, 1), vec![vec![1.0; 4]]);
        let decoder = Decoder::new(vocab(), Arc::new(stub), "a", greedy(5), fastrand::Rng::with_seed(1));
        let err = decoder.run().await.unwrap_err();
        assert!(err.to_string().contains("expected 16"));
    }

    #[tokio::test]
    async fn same_seed_same_text() {
        let shape = PredictorShape::new(16, 3, 1);
        let flat = vec![vec![1.0 / 16.0; 16]];
        let run = |seed| {
            let stub = StubPredictor::scripted(shape, flat.clone());
            let options = GenerateOptions {
                max_length: 12,
                top_k: 16,
                ..GenerateOptions::default()
            };
            Decoder::new(vocab(), Arc::new(stub), "a", options, fastrand::Rng::with_seed(seed)).run()
        };

        let first = run(99).await.unwrap();
        let second = run(99).await.unwrap();
        assert_eq!(first.tokens, second.tokens);
        assert!(first.generated().len() <= 12);
    }

    async fn first_sample(probs: &[f32], temperature: f32, seed: u64) -> usize {
        let stub = StubPredictor::scripted(PredictorShape::new(16, 3, 1), vec![probs.to_vec()]);
        let options = GenerateOptions {
            max_length: 1,
            temperature,
            top_k: 2,
            cancel: None,
        };
        let output = Decoder::new(vocab(), Arc::new(stub), "a", options, fastrand::Rng::with_seed(seed))
            .run()
            .await
            .unwrap();
        output.generated()[0]
    }

    #[tokio::test]
    async fn temperature_reshapes_the_sampled_distribution() {
        let mut probs = vec![0.0; 16];
        probs[3] = 0.6;
        probs[4] = 0.4;
        // After top-2 renormalisation id 3 holds about 0.88 of the mass at
        // T = 0.1 and about 0.51 at T = 5, so a draw in between separates them.
        let seed = (0..10_000u64)
            .find(|&seed| (0.6..0.8).contains(&fastrand::Rng::with_seed(seed).f64()))
            .unwrap();

        assert_eq!(first_sample(&probs, 0.1, seed).await, 3);
        assert_eq!(first_sample(&probs, 5.0, seed).await, 4);
    }

    #[tokio::test]
    async fn low_temperature_concentrates_samples() {
        let mut probs = vec![0.0; 16];
        probs[3] = 0.6;
        probs[4] = 0.4;

        let mut runner_up = [0usize; 2];
        for (slot, temperature) in [0.1f32, 5.0].into_iter().enumerate() {
            for seed in 0..200 {
                if first_sample(&probs, temperature, seed).await == 4 {
                    runner_up[slot] += 1;
                }
            }
        }
        // Expected counts are roughly 24 and 98 out of 200.
        assert!(runner_up[0] < 50, "T = 0.1 picked id 4 {} times", runner_up[0]);
        assert!(runner_up[1] > 70, "T = 5 picked id 4 {} times", runner_up[1]);
    }

    #[test]
    fn invalid_temperature_is_rejected() {
        for temperature in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let options = GenerateOptions {
                temperature,
                ..GenerateOptions::default()
            };
            assert!(options.validate().is_err());
        }
        assert!(GenerateOptions::default().validate().is_ok());
    }
}
