//! Word vocabulary and fixed-length sequence encoding

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel id used for post-padding; never assigned to a word
pub const PAD_ID: u32 = 0;

/// Frozen word → id mapping learned from a normalized training corpus.
///
/// Ids start at 1 in descending frequency order (ties keep first-occurrence
/// order). Only ids below `max_words` are ever emitted; other words, and words
/// never seen during fitting, are dropped at encode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabularyFile", into = "VocabularyFile")]
pub struct Vocabulary {
    max_words: usize,
    /// `words[i]` has id `i + 1`
    words: Vec<String>,
    index: HashMap<String, u32>,
}

#[derive(Clone, Serialize, Deserialize)]
struct VocabularyFile {
    max_words: usize,
    words: Vec<String>,
}

impl From<VocabularyFile> for Vocabulary {
    fn from(file: VocabularyFile) -> Self {
        Vocabulary::from_words(file.max_words, file.words)
    }
}

impl From<Vocabulary> for VocabularyFile {
    fn from(vocab: Vocabulary) -> Self {
        VocabularyFile {
            max_words: vocab.max_words,
            words: vocab.words,
        }
    }
}

impl Vocabulary {
    /// Fit on normalized texts
    pub fn fit<'a, I>(texts: I, max_words: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<&'a str, usize> = HashMap::new();
        let mut first_seen: Vec<&'a str> = Vec::new();

        for text in texts {
            for word in text.split(' ').filter(|w| !w.is_empty()) {
                let count = counts.entry(word).or_insert(0);
                if *count == 0 {
                    first_seen.push(word);
                }
                *count += 1;
            }
        }

        // Stable sort keeps first-occurrence order among equal counts
        first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));

        let keep = max_words.saturating_sub(1);
        let words = first_seen
            .into_iter()
            .take(keep)
            .map(str::to_string)
            .collect();

        Self::from_words(max_words, words)
    }

    /// Rebuild from an ordered word list (id = position + 1)
    pub fn from_words(max_words: usize, mut words: Vec<String>) -> Self {
        words.truncate(max_words.saturating_sub(1));
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), (i + 1) as u32))
            .collect();

        Self {
            max_words,
            words,
            index,
        }
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Number of words that can be emitted
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.index.get(word).copied()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        if id == PAD_ID {
            return None;
        }
        self.words.get(id as usize - 1).map(String::as_str)
    }

    /// Encode normalized text into exactly `max_len` ids.
    ///
    /// Unknown words are dropped. Longer sequences keep their last `max_len`
    /// ids; shorter ones are padded with [`PAD_ID`] at the end.
    pub fn encode(&self, normalized: &str, max_len: usize) -> Vec<u32> {
        let ids: Vec<u32> = normalized
            .split_whitespace()
            .filter_map(|w| self.id(w))
            .collect();

        let start = ids.len().saturating_sub(max_len);
        let mut sequence = ids[start..].to_vec();
        sequence.resize(max_len, PAD_ID);
        sequence
    }
}
