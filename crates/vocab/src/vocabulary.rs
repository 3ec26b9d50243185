//! Word ↔ id vocabulary built from corpus frequencies.

use crate::tokenizer::split_words;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

pub const PAD: usize = 0;
pub const UNK: usize = 1;
pub const START: usize = 2;

pub const PAD_TOKEN: &str = "<PAD>";
pub const UNK_TOKEN: &str = "<UNK>";
pub const START_TOKEN: &str = "<START>";

/// Number of ids taken by `<PAD>`, `<UNK>` and `<START>`.
pub const RESERVED_TOKENS: usize = 3;

const RESERVED: [(&str, usize); RESERVED_TOKENS] =
    [(PAD_TOKEN, PAD), (UNK_TOKEN, UNK), (START_TOKEN, START)];

/// Errors raised when a persisted vocabulary does not describe a valid mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("word {0:?} appears more than once")]
    DuplicateWord(String),
    #[error("id {0} appears more than once")]
    DuplicateId(usize),
    #[error("forward entry {word:?} -> {id} has no matching reverse entry")]
    NotInverse { word: String, id: usize },
    #[error("forward map has {forward} entries but reverse map has {reverse}")]
    SizeMismatch { forward: usize, reverse: usize },
    #[error("reserved token {token} must have id {expected}")]
    MissingReserved { token: &'static str, expected: usize },
}

/// Bidirectional word/id mapping.
///
/// The forward and reverse maps are always exact inverses of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    vocab: HashMap<String, usize>,
    reverse_vocab: HashMap<usize, String>,
}

impl Vocabulary {
    /// A vocabulary with no entries at all, not even the reserved tokens.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Vocabulary holding only `<PAD>`, `<UNK>` and `<START>`.
    pub fn reserved() -> Self {
        let mut vocab = Self::empty();
        for (token, id) in RESERVED {
            vocab.insert(token.to_string(), id);
        }
        vocab
    }

    /// Build a vocabulary of at most `capacity` entries from `texts`.
    ///
    /// Words are ranked by descending frequency; equal frequencies keep the
    /// order in which the words were first seen. Ids start at
    /// [`RESERVED_TOKENS`].
    pub fn build<S: AsRef<str>>(texts: &[S], capacity: usize) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, usize)> = Vec::new();

        for text in texts {
            for word in split_words(text.as_ref()) {
                match seen.get(&word) {
                    Some(&slot) => counts[slot].1 += 1,
                    None => {
                        seen.insert(word.clone(), counts.len());
                        counts.push((word, 1));
                    }
                }
            }
        }

        let distinct = counts.len();
        // `sort_by` is stable, so ties stay in first-seen order.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(capacity.saturating_sub(RESERVED_TOKENS));

        let mut vocab = Self::reserved();
        for (idx, (word, _)) in counts.into_iter().enumerate() {
            vocab.insert(word, idx + RESERVED_TOKENS);
        }

        debug!(
            distinct_words = distinct,
            capacity,
            size = vocab.len(),
            "vocabulary built"
        );
        vocab
    }

    /// Rebuild a vocabulary from persisted forward and reverse pairs.
    pub fn from_pairs(
        forward: Vec<(String, usize)>,
        reverse: Vec<(usize, String)>,
    ) -> Result<Self, VocabularyError> {
        if forward.len() != reverse.len() {
            return Err(VocabularyError::SizeMismatch {
                forward: forward.len(),
                reverse: reverse.len(),
            });
        }

        let mut reverse_vocab = HashMap::with_capacity(reverse.len());
        for (id, word) in reverse {
            if reverse_vocab.insert(id, word).is_some() {
                return Err(VocabularyError::DuplicateId(id));
            }
        }

        let mut vocab = HashMap::with_capacity(forward.len());
        for (word, id) in forward {
            if reverse_vocab.get(&id) != Some(&word) {
                return Err(VocabularyError::NotInverse { word, id });
            }
            if vocab.contains_key(&word) {
                return Err(VocabularyError::DuplicateWord(word));
            }
            vocab.insert(word, id);
        }

        for (token, expected) in RESERVED {
            if vocab.get(token) != Some(&expected) {
                return Err(VocabularyError::MissingReserved { token, expected });
            }
        }

        Ok(Self {
            vocab,
            reverse_vocab,
        })
    }

    fn insert(&mut self, word: String, id: usize) {
        self.reverse_vocab.insert(id, word.clone());
        self.vocab.insert(word, id);
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.vocab.get(word).copied()
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.reverse_vocab.get(&id).map(String::as_str)
    }

    /// `[word, id]` pairs ordered by id.
    pub fn forward_pairs(&self) -> Vec<(String, usize)> {
        let mut pairs: Vec<_> = self
            .vocab
            .iter()
            .map(|(word, &id)| (word.clone(), id))
            .collect();
        pairs.sort_by_key(|(_, id)| *id);
        pairs
    }

    /// `[id, word]` pairs ordered by id.
    pub fn reverse_pairs(&self) -> Vec<(usize, String)> {
        let mut pairs: Vec<_> = self
            .reverse_vocab
            .iter()
            .map(|(&id, word)| (id, word.clone()))
            .collect();
        pairs.sort_by_key(|(id, _)| *id);
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequent_words_get_lower_ids() {
        let vocab = Vocabulary::build(&["b a a c a b"], 100);
        assert_eq!(vocab.id("a"), Some(3));
        assert_eq!(vocab.id("b"), Some(4));
        assert_eq!(vocab.id("c"), Some(5));
    }

    #[test]
    fn ties_follow_first_occurrence() {
        let vocab = Vocabulary::build(&["zeta alpha", "mid zeta alpha mid"], 100);
        assert_eq!(vocab.id("zeta"), Some(3));
        assert_eq!(vocab.id("alpha"), Some(4));
        assert_eq!(vocab.id("mid"), Some(5));
    }

    #[test]
    fn capacity_limits_size() {
        let vocab = Vocabulary::build(&["one two three four five"], 6);
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.id("three"), Some(5));
        assert_eq!(vocab.id("four"), None);
    }

    #[test]
    fn small_corpus_scenario() {
        let vocab = Vocabulary::build(&["ola mundo", "ola"], 6);
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.id(PAD_TOKEN), Some(PAD));
        assert_eq!(vocab.id(UNK_TOKEN), Some(UNK));
        assert_eq!(vocab.id(START_TOKEN), Some(START));
        assert_eq!(vocab.id("ola"), Some(3));
        assert_eq!(vocab.id("mundo"), Some(4));
    }

    #[test]
    fn empty_corpus_keeps_reserved_tokens() {
        let vocab = Vocabulary::build::<&str>(&[], 10_000);
        assert_eq!(vocab, Vocabulary::reserved());
        assert_eq!(vocab.len(), RESERVED_TOKENS);
    }

    #[test]
    fn maps_are_inverse() {
        let vocab = Vocabulary::build(&["The cat sat on THE mat", "a cat"], 50);
        for (word, id) in vocab.forward_pairs() {
            assert_eq!(vocab.word(id), Some(word.as_str()));
        }
        assert_eq!(vocab.forward_pairs().len(), vocab.reverse_pairs().len());
    }

    #[test]
    fn from_pairs_round_trips() {
        let vocab = Vocabulary::build(&["ola mundo", "ola"], 6);
        let rebuilt = Vocabulary::from_pairs(vocab.forward_pairs(), vocab.reverse_pairs()).unwrap();
        assert_eq!(rebuilt, vocab);
    }

    #[test]
    fn from_pairs_rejects_non_inverse_maps() {
        let vocab = Vocabulary::build(&["ola mundo"], 6);
        let mut reverse = vocab.reverse_pairs();
        reverse[3].1 = "outro".to_string();
        let err = Vocabulary::from_pairs(vocab.forward_pairs(), reverse).unwrap_err();
        assert!(matches!(err, VocabularyError::NotInverse { .. }));
    }

    #[test]
    fn from_pairs_requires_reserved_tokens() {
        let err = Vocabulary::from_pairs(
            vec![("ola".to_string(), 0)],
            vec![(0, "ola".to_string())],
        )
        .unwrap_err();
        assert_eq!(
            err,
            VocabularyError::MissingReserved {
                token: PAD_TOKEN,
                expected: PAD
            }
        );
    }
}
