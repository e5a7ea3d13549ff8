//! Text preprocessing module
//!
//! Provides normalization, stem canonicalization, and document-term
//! matrix construction for preparing survey text for topic modeling.

pub mod normalizer;
pub mod vectorizer;

pub use normalizer::{CanonicalMap, NormalizedCorpus, Normalizer};
pub use vectorizer::{CountVectorizer, DocumentTermMatrix};
