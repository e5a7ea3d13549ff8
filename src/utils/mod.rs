//! Utility helpers
//!
//! Dataset loading and saving for demos and offline analysis.

pub mod io;

pub use io::{IoError, SurveyDataset};
