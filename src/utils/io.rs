//! Survey dataset loading and saving
//!
//! The pipeline itself never touches the filesystem; these helpers exist
//! for demo binaries and offline experiments working from JSON exports.

use crate::types::{MomentRecord, RespondentDemographics};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or saving datasets
#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A survey export: moments plus demographics, already filtered by the
/// caller's inclusion criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDataset {
    pub moments: Vec<MomentRecord>,
    pub demographics: Vec<RespondentDemographics>,
}

impl SurveyDataset {
    /// Load a dataset from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let contents = fs::read_to_string(path)?;
        let dataset = serde_json::from_str(&contents)?;
        Ok(dataset)
    }

    /// Save the dataset to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn n_moments(&self) -> usize {
        self.moments.len()
    }

    pub fn n_respondents(&self) -> usize {
        let mut ids: Vec<u64> = self.demographics.iter().map(|d| d.respondent_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_json() {
        let dataset = SurveyDataset {
            moments: vec![MomentRecord {
                respondent_id: 1,
                moment_id: 10,
                raw_text: "I watched the sunrise".to_string(),
                sentence_count: 1,
                category_label: Some("nature".to_string()),
            }],
            demographics: vec![RespondentDemographics {
                respondent_id: 1,
                age: 29.0,
                gender: Some(0),
                parenthood: 0,
                marital: 1,
            }],
        };

        let json = serde_json::to_string(&dataset).unwrap();
        let parsed: SurveyDataset = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.n_moments(), 1);
        assert_eq!(parsed.n_respondents(), 1);
        assert_eq!(parsed.moments[0].raw_text, "I watched the sunrise");
    }
}
