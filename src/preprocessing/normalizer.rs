//! Text normalization and stem canonicalization
//!
//! This module provides tools for:
//! - Text cleaning (lowercasing, punctuation/digit stripping)
//! - Tokenization and stop word removal
//! - Stem-based canonicalization of inflected word forms
//!
//! Canonicalization is a two-pass procedure: the first pass builds an
//! immutable stem -> canonical-form mapping from the whole corpus, the
//! second pass rewrites every document against that frozen mapping. The
//! canonical form for a stem is the most frequent original token producing
//! that stem, with ties broken by first-encountered order.

use hashbrown::HashMap;
use log::warn;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

/// Minimum surviving tokens for a document to be retained.
const MIN_DOC_TOKENS: usize = 2;

/// Frozen mapping from stem to its canonical surface form.
#[derive(Debug, Clone, Default)]
pub struct CanonicalMap {
    map: HashMap<String, String>,
}

impl CanonicalMap {
    /// Look up the canonical surface form for a stem.
    pub fn canonical_for(&self, stem: &str) -> Option<&str> {
        self.map.get(stem).map(|s| s.as_str())
    }

    /// Number of stems with a canonical form.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over (stem, canonical) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Result of normalizing a corpus.
///
/// `retained` holds the indices of the input documents that survived the
/// minimum-token filter, in input order, so callers can re-join document
/// metadata such as respondent ids.
#[derive(Debug, Clone)]
pub struct NormalizedCorpus {
    /// Canonicalized token sequences, one per retained document
    pub documents: Vec<Vec<String>>,
    /// Input indices of the retained documents
    pub retained: Vec<usize>,
    /// Number of documents dropped for having fewer than 2 tokens
    pub dropped: usize,
    /// The stem -> canonical mapping built from the whole corpus
    pub canonical: CanonicalMap,
}

/// Text normalizer with a fixed English stop word list and a
/// suffix-stripping stemmer.
pub struct Normalizer {
    stop_words: HashSet<String>,
    stemmer: Stemmer,
    punct_pattern: Regex,
    digit_pattern: Regex,
    whitespace_pattern: Regex,
}

impl Normalizer {
    /// Create a normalizer with the default English stop words.
    pub fn new() -> Self {
        Self {
            stop_words: default_stop_words(),
            stemmer: Stemmer::create(Algorithm::English),
            punct_pattern: Regex::new(r"[^\w\s]").unwrap(),
            digit_pattern: Regex::new(r"\d").unwrap(),
            whitespace_pattern: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Add custom stop words.
    pub fn add_stop_words(&mut self, words: &[&str]) {
        for word in words {
            self.stop_words.insert(word.to_lowercase());
        }
    }

    /// Clean and normalize raw text.
    ///
    /// Lowercases, strips punctuation, strips digits, and collapses
    /// whitespace runs, in that order.
    pub fn clean(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let no_punct = self.punct_pattern.replace_all(&lowered, " ");
        let no_digits = self.digit_pattern.replace_all(&no_punct, "");
        let collapsed = self.whitespace_pattern.replace_all(&no_digits, " ");
        collapsed.trim().to_string()
    }

    /// Tokenize cleaned text into stop-word-filtered tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let cleaned = self.clean(text);

        cleaned
            .unicode_words()
            .filter(|word| !self.stop_words.contains(*word))
            .map(|s| s.to_string())
            .collect()
    }

    /// Stem a single token.
    pub fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token).to_string()
    }

    /// Normalize a whole corpus.
    ///
    /// Pass 1 tokenizes every document and builds the stem -> canonical
    /// mapping from global token frequencies. Pass 2 rewrites each document
    /// by replacing every token with its stem's canonical form; tokens
    /// whose stem has no canonical form are dropped. Documents with fewer
    /// than 2 surviving tokens are excluded from the result.
    ///
    /// An empty corpus yields an empty result, not an error.
    pub fn normalize_corpus(&self, raw_documents: &[String]) -> NormalizedCorpus {
        let tokenized: Vec<Vec<String>> = raw_documents
            .iter()
            .map(|doc| self.tokenize(doc))
            .collect();

        let canonical = self.build_canonical_map(&tokenized);

        let mut documents = Vec::new();
        let mut retained = Vec::new();
        let mut dropped = 0;

        for (idx, tokens) in tokenized.iter().enumerate() {
            let rewritten: Vec<String> = tokens
                .iter()
                .filter_map(|token| {
                    let stem = self.stem(token);
                    canonical.canonical_for(&stem).map(|c| c.to_string())
                })
                .collect();

            if rewritten.len() >= MIN_DOC_TOKENS {
                retained.push(idx);
                documents.push(rewritten);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(
                "dropped {} of {} documents with fewer than {} tokens after normalization",
                dropped,
                raw_documents.len(),
                MIN_DOC_TOKENS
            );
        }

        NormalizedCorpus {
            documents,
            retained,
            dropped,
            canonical,
        }
    }

    /// Build the stem -> canonical mapping from tokenized documents.
    ///
    /// The candidate pool for canonical forms excludes tokens that are
    /// themselves stop words; stemming in the rewrite pass applies no such
    /// exclusion. This asymmetry keeps stop words out of the visible
    /// vocabulary even when custom lists diverge from the tokenizer's.
    fn build_canonical_map(&self, tokenized: &[Vec<String>]) -> CanonicalMap {
        // stem -> candidates in first-encountered order, with counts
        let mut candidates: HashMap<String, Vec<(String, usize)>> = HashMap::new();
        // preserves first-encountered order of stems for deterministic output
        let mut stem_order: Vec<String> = Vec::new();

        for tokens in tokenized {
            for token in tokens {
                if self.stop_words.contains(token) {
                    continue;
                }
                let stem = self.stem(token);
                let entry = candidates.entry(stem.clone()).or_insert_with(|| {
                    stem_order.push(stem);
                    Vec::new()
                });
                match entry.iter_mut().find(|(t, _)| t == token) {
                    Some((_, count)) => *count += 1,
                    None => entry.push((token.clone(), 1)),
                }
            }
        }

        let mut map = HashMap::with_capacity(candidates.len());
        for stem in stem_order {
            let pool = &candidates[&stem];
            // strict comparison keeps the earliest candidate on ties
            let mut best = &pool[0];
            for candidate in &pool[1..] {
                if candidate.1 > best.1 {
                    best = candidate;
                }
            }
            map.insert(stem, best.0.clone());
        }

        CanonicalMap { map }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("stop_words", &self.stop_words.len())
            .field("stemmer", &"<english>")
            .finish()
    }
}

/// Default English stop words.
fn default_stop_words() -> HashSet<String> {
    let words = [
        // Articles
        "a", "an", "the",
        // Pronouns
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those",
        // Verbs
        "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
        "do", "does", "did", "doing", "would", "should", "could", "ought", "might", "must",
        "shall", "will", "can", "may",
        // Prepositions
        "at", "by", "for", "from", "in", "into", "of", "on", "to", "with", "about", "against",
        "between", "during", "before", "after", "above", "below", "up", "down", "out", "off",
        "over", "under", "again", "further", "then", "once",
        // Conjunctions
        "and", "but", "or", "nor", "so", "yet", "both", "either", "neither", "not", "only",
        "than", "when", "where", "while", "if", "because", "as", "until", "although",
        // Other common words
        "here", "there", "all", "each", "few", "more", "most", "other", "some", "such", "no",
        "any", "own", "same", "too", "very", "just", "also", "now", "how", "why", "well",
    ];

    words.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_punctuation_and_digits() {
        let normalizer = Normalizer::new();
        let cleaned = normalizer.clean("I ate 2 pizzas, really!");

        assert!(!cleaned.contains(','));
        assert!(!cleaned.contains('!'));
        assert!(!cleaned.contains('2'));
        assert_eq!(cleaned, "i ate pizzas really");
    }

    #[test]
    fn test_tokenize_removes_stop_words() {
        let normalizer = Normalizer::new();
        let tokens = normalizer.tokenize("I went to the park with my dog");

        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"my".to_string()));
        assert!(tokens.contains(&"went".to_string()));
        assert!(tokens.contains(&"park".to_string()));
        assert!(tokens.contains(&"dog".to_string()));
    }

    #[test]
    fn test_tokens_are_clean() {
        let normalizer = Normalizer::new();
        let corpus = vec![
            "My kids' 3rd birthday-party was amazing!!".to_string(),
            "We grilled burgers; everyone laughed (a lot).".to_string(),
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        for doc in &normalized.documents {
            for token in doc {
                assert!(token.chars().all(|c| c.is_alphabetic()), "dirty token {token:?}");
                assert!(!default_stop_words().contains(token));
            }
        }
    }

    #[test]
    fn test_canonical_most_frequent_wins() {
        let normalizer = Normalizer::new();
        let corpus = vec![
            "run running running".to_string(),
            "running runner".to_string(),
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        // "run", "running" share the stem "run"; "running" occurs 3 times
        let stem = normalizer.stem("running");
        assert_eq!(normalized.canonical.canonical_for(&stem), Some("running"));
    }

    #[test]
    fn test_canonical_tie_breaks_to_first_encountered() {
        let normalizer = Normalizer::new();
        // "walked" and "walking" both stem to "walk" and occur twice each;
        // "walked" is seen first
        let corpus = vec![
            "walked walking".to_string(),
            "walking walked".to_string(),
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        let stem = normalizer.stem("walked");
        assert_eq!(normalized.canonical.canonical_for(&stem), Some("walked"));
    }

    #[test]
    fn test_canonical_map_is_total_over_rewritten_tokens() {
        let normalizer = Normalizer::new();
        let corpus = vec![
            "dogs played happily outside".to_string(),
            "dog plays outside daily".to_string(),
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        for doc in &normalized.documents {
            for token in doc {
                let stem = normalizer.stem(token);
                assert!(normalized.canonical.canonical_for(&stem).is_some());
            }
        }
    }

    #[test]
    fn test_short_documents_are_dropped() {
        let normalizer = Normalizer::new();
        let corpus = vec![
            "pizza".to_string(),                  // 1 token: dropped
            "pizza dinner".to_string(),           // 2 tokens: kept
            "the of and".to_string(),             // 0 tokens: dropped
            "sunset beach walk".to_string(),      // 3 tokens: kept
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        assert_eq!(normalized.dropped, 2);
        assert_eq!(normalized.retained, vec![1, 3]);
        assert_eq!(normalized.documents.len(), 2);
    }

    #[test]
    fn test_empty_corpus_is_not_an_error() {
        let normalizer = Normalizer::new();
        let normalized = normalizer.normalize_corpus(&[]);

        assert!(normalized.documents.is_empty());
        assert_eq!(normalized.dropped, 0);
        assert!(normalized.canonical.is_empty());
    }

    #[test]
    fn test_inflections_collapse_to_one_column_form() {
        let normalizer = Normalizer::new();
        let corpus = vec![
            "I ate a big pizza today".to_string(),
            "I ate pizza yesterday too".to_string(),
            "My dog ran in the park".to_string(),
        ];

        let normalized = normalizer.normalize_corpus(&corpus);
        assert_eq!(normalized.documents.len(), 3);

        // both "ate" occurrences rewrite to the same canonical form
        let stem = normalizer.stem("ate");
        let canonical = normalized.canonical.canonical_for(&stem).unwrap();
        assert!(normalized.documents[0].contains(&canonical.to_string()));
        assert!(normalized.documents[1].contains(&canonical.to_string()));
        assert!(!normalized.documents[2].contains(&canonical.to_string()));
    }
}
