//! Whitespace word tokenizer over a [`Vocabulary`].

use crate::vocabulary::{Vocabulary, PAD_TOKEN, START_TOKEN, UNK, UNK_TOKEN};

/// Lower-case `text` and split it on runs of whitespace.
pub fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

impl Vocabulary {
    /// Map every word of `text` to its id, `<UNK>` for unknown words.
    pub fn tokenize(&self, text: &str) -> Vec<usize> {
        split_words(text)
            .iter()
            .map(|word| self.id(word).unwrap_or(UNK))
            .collect()
    }

    /// Map ids back to words and join them with single spaces.
    ///
    /// Ids with no entry render as `<UNK>`. `<PAD>` and `<START>` are
    /// dropped from the output; `<UNK>` is kept.
    pub fn detokenize(&self, ids: &[usize]) -> String {
        ids.iter()
            .map(|&id| self.word(id).unwrap_or(UNK_TOKEN))
            .filter(|word| *word != PAD_TOKEN && *word != START_TOKEN)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{PAD, START};

    fn ola_vocab() -> Vocabulary {
        Vocabulary::build(&["ola mundo", "ola"], 6)
    }

    #[test]
    fn tokenize_maps_unknown_words_to_unk() {
        assert_eq!(ola_vocab().tokenize("ola mundo foo"), vec![3, 4, 1]);
    }

    #[test]
    fn tokenize_is_case_insensitive_and_ignores_extra_whitespace() {
        assert_eq!(ola_vocab().tokenize("  OLA\t\tMundo \n"), vec![3, 4]);
        assert!(ola_vocab().tokenize("   ").is_empty());
    }

    #[test]
    fn detokenize_drops_pad_and_start() {
        assert_eq!(ola_vocab().detokenize(&[START, 3, 4, PAD]), "ola mundo");
    }

    #[test]
    fn detokenize_keeps_unk_and_out_of_range_ids() {
        let vocab = ola_vocab();
        assert_eq!(vocab.detokenize(&[3, UNK, 4]), "ola <UNK> mundo");
        assert_eq!(vocab.detokenize(&[3, 9_999]), "ola <UNK>");
    }

    #[test]
    fn tokenizer_encode_decode() {
        let vocab = Vocabulary::build(&["the quick brown fox jumps over the lazy dog"], 1000);
        let text = "The Quick brown FOX";
        let ids = vocab.tokenize(text);
        assert_eq!(ids.len(), 4);
        assert_eq!(vocab.detokenize(&ids), text.to_lowercase());
    }
}
