//! Document-term matrix construction
//!
//! Converts normalized token sequences into a bag-of-words count matrix.
//! The vocabulary is the union of all tokens in the corpus, ordered
//! alphabetically so that the same input always yields the same column
//! layout within a run.

use hashbrown::HashMap;
use ndarray::{Array1, Array2};
use std::collections::HashSet;

/// Bag-of-words count vectorizer.
///
/// Terms are exactly the whitespace-delimited tokens of the normalized
/// documents; no further stemming or filtering is applied here.
#[derive(Debug, Clone, Default)]
pub struct CountVectorizer {
    /// Vocabulary: term -> column index
    vocabulary: HashMap<String, usize>,
    /// Inverse vocabulary: column index -> term
    terms: Vec<String>,
    is_fitted: bool,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the vocabulary from tokenized documents.
    pub fn fit(&mut self, tokenized_docs: &[Vec<String>]) {
        let mut vocab_set: HashSet<&String> = HashSet::new();
        for doc in tokenized_docs {
            for token in doc {
                vocab_set.insert(token);
            }
        }

        let mut terms: Vec<String> = vocab_set.into_iter().cloned().collect();
        terms.sort();

        self.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        self.terms = terms;
        self.is_fitted = true;
    }

    /// Transform tokenized documents into a count matrix.
    ///
    /// Tokens absent from the fitted vocabulary are ignored.
    pub fn transform(&self, tokenized_docs: &[Vec<String>]) -> Array2<f64> {
        assert!(self.is_fitted, "Vectorizer must be fitted before transform");

        let mut matrix = Array2::zeros((tokenized_docs.len(), self.vocabulary.len()));
        for (doc_idx, doc) in tokenized_docs.iter().enumerate() {
            for token in doc {
                if let Some(&term_idx) = self.vocabulary.get(token) {
                    matrix[[doc_idx, term_idx]] += 1.0;
                }
            }
        }
        matrix
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, tokenized_docs: &[Vec<String>]) -> Array2<f64> {
        self.fit(tokenized_docs);
        self.transform(tokenized_docs)
    }

    /// Get the vocabulary mapping.
    pub fn get_vocabulary(&self) -> &HashMap<String, usize> {
        &self.vocabulary
    }

    /// Get term by column index.
    pub fn get_term(&self, index: usize) -> Option<&String> {
        self.terms.get(index)
    }

    /// Get the ordered term list.
    pub fn get_terms(&self) -> &[String] {
        &self.terms
    }

    /// Get vocabulary size.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Document-term matrix with its vocabulary and document identifiers.
#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    /// Count matrix (n_documents x n_terms)
    pub matrix: Array2<f64>,
    /// Vocabulary: term -> column index
    pub vocabulary: HashMap<String, usize>,
    /// Ordered terms (column labels)
    pub terms: Vec<String>,
    /// Document identifiers, parallel to the matrix rows
    pub document_ids: Vec<u64>,
}

impl DocumentTermMatrix {
    /// Build a DTM from tokenized documents and their identifiers.
    pub fn from_documents(tokenized_docs: &[Vec<String>], document_ids: Vec<u64>) -> Self {
        assert_eq!(
            tokenized_docs.len(),
            document_ids.len(),
            "one id per document required"
        );

        let mut vectorizer = CountVectorizer::new();
        let matrix = vectorizer.fit_transform(tokenized_docs);

        Self {
            matrix,
            vocabulary: vectorizer.vocabulary,
            terms: vectorizer.terms,
            document_ids,
        }
    }

    /// Matrix dimensions (documents, terms).
    pub fn shape(&self) -> (usize, usize) {
        (self.matrix.nrows(), self.matrix.ncols())
    }

    pub fn n_documents(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_terms(&self) -> usize {
        self.matrix.ncols()
    }

    /// True when the matrix has no rows or no columns.
    pub fn is_degenerate(&self) -> bool {
        self.n_documents() == 0 || self.n_terms() == 0
    }

    /// Token count per document (row sums).
    pub fn row_sums(&self) -> Array1<f64> {
        let sums: Vec<f64> = self
            .matrix
            .rows()
            .into_iter()
            .map(|row| row.sum())
            .collect();
        Array1::from(sums)
    }

    /// Count for a given document row and term.
    pub fn count(&self, doc_idx: usize, term: &str) -> Option<f64> {
        self.vocabulary
            .get(term)
            .map(|&term_idx| self.matrix[[doc_idx, term_idx]])
    }
}
