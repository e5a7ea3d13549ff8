//! Statistical models
//!
//! This module provides the two algorithmic workhorses of the pipeline:
//! - LDA (Latent Dirichlet Allocation) via collapsed Gibbs sampling
//! - K-means clustering with seeded restarts

pub mod kmeans;
pub mod lda;

pub use kmeans::{KMeans, KMeansConfig, KMeansError, KMeansResult};
pub use lda::{
    BetaEntry, CancelFlag, ConvergenceCheck, FixedBudget, Lda, LdaConfig, LdaError, TopicTerms,
};
