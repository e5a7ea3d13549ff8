//! Respondent aggregation and segmentation
//!
//! Collapses document-level topic weights into one feature vector per
//! respondent and partitions respondents into demographic-behavioral
//! segments.

pub mod aggregator;
pub mod segmenter;

pub use aggregator::{aggregate_respondents, RespondentFeatures};
pub use segmenter::{elbow_curve, feature_matrix, segment, ClusterDiagnostics, ClusterProfile, Segmentation};

use thiserror::Error;

/// Errors that can occur during aggregation or segmentation
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("No demographics for respondent {0}")]
    MissingDemographics(u64),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("No respondents to segment")]
    EmptyInput,

    #[error(transparent)]
    KMeans(#[from] crate::models::KMeansError),
}
