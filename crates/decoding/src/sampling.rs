//! Temperature scaling, top-K truncation and categorical sampling.

use serde::Serialize;
use wordforge_vocab::PAD;

/// Divide `probs` by `temperature` and renormalise with a softmax.
///
/// The input is already a probability vector; the scaling is applied to it
/// directly rather than to logits.
pub fn scale_by_temperature(probs: &[f32], temperature: f32) -> Vec<f32> {
    let mut scaled: Vec<f32> = probs.iter().map(|&p| p / temperature).collect();
    let max = scaled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    for value in scaled.iter_mut() {
        *value = (*value - max).exp();
    }
    let sum: f32 = scaled.iter().sum();
    for value in scaled.iter_mut() {
        *value /= sum;
    }
    scaled
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub id: usize,
    pub probability: f64,
}

/// At most K candidates in descending probability order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    candidates: Vec<Candidate>,
}

impl Distribution {
    /// Keep the `k` most probable ids and renormalise them to sum to one.
    ///
    /// Equal probabilities keep ascending id order. When the kept mass is not
    /// a positive finite number the candidates are returned unnormalised and
    /// sampling falls through to the last one.
    pub fn top_k(probs: &[f32], k: usize) -> Self {
        let mut indexed: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);

        let total: f64 = indexed.iter().map(|&(_, p)| f64::from(p)).sum();
        let norm = if total.is_finite() && total > 0.0 {
            total
        } else {
            1.0
        };

        let candidates = indexed
            .into_iter()
            .map(|(id, p)| Candidate {
                id,
                probability: f64::from(p) / norm,
            })
            .collect();
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.candidates.iter().map(|c| c.probability).sum()
    }

    /// The first candidate whose running probability exceeds `r`.
    ///
    /// Falls back to the last candidate when rounding keeps the running sum
    /// at or below `r`, and to `<PAD>` when there are no candidates.
    pub fn sample_with(&self, r: f64) -> usize {
        let mut cumulative = 0.0;
        for candidate in &self.candidates {
            cumulative += candidate.probability;
            if r < cumulative {
                return candidate.id;
            }
        }
        self.candidates.last().map_or(PAD, |c| c.id)
    }

    pub fn sample(&self, rng: &mut fastrand::Rng) -> usize {
        self.sample_with(rng.f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_scaling_renormalises_probabilities() {
        let scaled = scale_by_temperature(&[0.5, 0.25, 0.25], 0.5);
        let sum: f32 = scaled.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);

        // softmax([1.0, 0.5, 0.5])
        let e = [1.0f32.exp(), 0.5f32.exp(), 0.5f32.exp()];
        let z: f32 = e.iter().sum();
        for (got, want) in scaled.iter().zip(e.iter().map(|v| v / z)) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn lower_temperature_sharpens() {
        let probs = [0.7, 0.2, 0.1];
        let cold = scale_by_temperature(&probs, 0.1);
        let hot = scale_by_temperature(&probs, 2.0);
        assert!(cold[0] > hot[0]);
    }

    #[test]
    fn top_k_keeps_k_and_sums_to_one() {
        let probs = [0.05, 0.4, 0.1, 0.3, 0.15];
        let dist = Distribution::top_k(&probs, 3);
        let ids: Vec<usize> = dist.candidates().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!((dist.total() - 1.0).abs() < 1e-6);
        assert!((dist.candidates()[0].probability - 0.4 / 0.85).abs() < 1e-6);
    }

    #[test]
    fn top_k_larger_than_vocabulary_keeps_everything() {
        let dist = Distribution::top_k(&[0.2, 0.8], 40);
        assert_eq!(dist.len(), 2);
        assert!((dist.total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn top_k_ties_keep_id_order() {
        let dist = Distribution::top_k(&[0.25, 0.25, 0.25, 0.25], 2);
        let ids: Vec<usize> = dist.candidates().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn sampling_walks_cumulative_mass() {
        let dist = Distribution::top_k(&[0.5, 0.3, 0.2], 3);
        assert_eq!(dist.sample_with(0.0), 0);
        assert_eq!(dist.sample_with(0.49), 0);
        assert_eq!(dist.sample_with(0.5), 1);
        assert_eq!(dist.sample_with(0.79), 1);
        assert_eq!(dist.sample_with(0.95), 2);
    }

    #[test]
    fn sampling_falls_back_to_last_candidate() {
        let dist = Distribution::top_k(&[0.6, 0.4], 2);
        assert_eq!(dist.sample_with(1.0), 1);

        let degenerate = Distribution::top_k(&[f32::NAN, f32::NAN, 0.3], 3);
        let last = degenerate.candidates().last().unwrap().id;
        assert_eq!(degenerate.sample_with(0.1), last);
    }

    #[test]
    fn empty_distribution_samples_pad() {
        let dist = Distribution::top_k(&[0.5, 0.5], 0);
        assert!(dist.is_empty());
        assert_eq!(dist.sample_with(0.3), PAD);
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let dist = Distribution::top_k(&[0.1, 0.2, 0.3, 0.4], 4);
        let mut a = fastrand::Rng::with_seed(11);
        let mut b = fastrand::Rng::with_seed(11);
        let first: Vec<usize> = (0..32).map(|_| dist.sample(&mut a)).collect();
        let second: Vec<usize> = (0..32).map(|_| dist.sample(&mut b)).collect();
        assert_eq!(first, second);
    }
}
