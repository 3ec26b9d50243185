//! Fixed-width (window, label) pairs for next-token training.

use crate::vocabulary::{Vocabulary, PAD};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
    pub window: Vec<usize>,
    pub label: usize,
}

/// Column-oriented training data: `windows[i]` predicts `labels[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub windows: Vec<Vec<usize>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The last `width` ids of `tokens`, left-padded with `<PAD>` to exactly `width`.
pub fn context_window(tokens: &[usize], width: usize) -> Vec<usize> {
    let tail = &tokens[tokens.len().saturating_sub(width)..];
    let mut window = Vec::with_capacity(width);
    window.resize(width - tail.len(), PAD);
    window.extend_from_slice(tail);
    window
}

/// One example per position except the last: the window ends at token `i`
/// and the label is token `i + 1`.
pub fn sliding_windows(tokens: &[usize], width: usize) -> Vec<TrainingExample> {
    if tokens.len() < 2 {
        return Vec::new();
    }

    (0..tokens.len() - 1)
        .map(|i| TrainingExample {
            window: context_window(&tokens[..=i], width),
            label: tokens[i + 1],
        })
        .collect()
}

/// Tokenize and window every text of the corpus, preserving corpus order.
pub fn build_dataset<S>(vocab: &Vocabulary, texts: &[S], width: usize) -> Dataset
where
    S: AsRef<str> + Sync,
{
    let per_text: Vec<Vec<TrainingExample>> = texts
        .par_iter()
        .map(|text| sliding_windows(&vocab.tokenize(text.as_ref()), width))
        .collect();

    let mut dataset = Dataset::default();
    for example in per_text.into_iter().flatten() {
        dataset.windows.push(example.window);
        dataset.labels.push(example.label);
    }
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_are_left_padded() {
        let examples = sliding_windows(&[5, 6, 7], 4);
        assert_eq!(
            examples,
            vec![
                TrainingExample {
                    window: vec![0, 0, 0, 5],
                    label: 6
                },
                TrainingExample {
                    window: vec![0, 0, 5, 6],
                    label: 7
                },
            ]
        );
    }

    #[test]
    fn long_sequences_slide() {
        let tokens: Vec<usize> = (10..20).collect();
        let examples = sliding_windows(&tokens, 3);
        assert_eq!(examples.len(), tokens.len() - 1);
        for (i, example) in examples.iter().enumerate() {
            assert_eq!(example.window.len(), 3);
            assert_eq!(*example.window.last().unwrap(), tokens[i]);
            assert_eq!(example.label, tokens[i + 1]);
        }
        assert_eq!(examples[5].window, vec![13, 14, 15]);
    }

    #[test]
    fn short_sequences_emit_nothing() {
        assert!(sliding_windows(&[], 4).is_empty());
        assert!(sliding_windows(&[7], 4).is_empty());
    }

    #[test]
    fn context_window_truncates_from_the_left() {
        assert_eq!(context_window(&[1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
        assert_eq!(context_window(&[], 2), vec![0, 0]);
    }

    #[test]
    fn dataset_keeps_corpus_order() {
        let texts = ["ola mundo ola", "mundo ola"];
        let vocab = Vocabulary::build(&texts, 10);
        let dataset = build_dataset(&vocab, &texts, 2);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.windows, vec![vec![0, 3], vec![3, 4], vec![0, 4]]);
        assert_eq!(dataset.labels, vec![4, 3, 3]);
    }
}
