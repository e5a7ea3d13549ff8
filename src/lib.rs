//! # Happy Segments - Topic Discovery and Respondent Segmentation
//!
//! This library turns free-text survey responses ("happy moments") plus
//! respondent demographics into ad-targeting personas:
//!
//! - `preprocessing` - Text normalization, stem canonicalization, and
//!   document-term matrix construction
//! - `models` - LDA topic inference (collapsed Gibbs sampling) and k-means
//!   clustering
//! - `segments` - Per-respondent feature aggregation and segmentation
//! - `pipeline` - End-to-end orchestration of the five pipeline stages
//! - `types` - Survey record types
//! - `utils` - Dataset loading helpers

pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod segments;
pub mod types;
pub mod utils;

pub use pipeline::{PersonaPipeline, PersonaReport, PipelineConfig, PipelineError};
pub use types::{MomentRecord, RespondentDemographics};
