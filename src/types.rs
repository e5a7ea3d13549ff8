//! Survey record types consumed by the pipeline
//!
//! The caller is expected to have applied its own inclusion filters
//! (country, age range, binary demographic encodings) before handing
//! records to the pipeline.

use serde::{Deserialize, Serialize};

/// One respondent-submitted happy moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentRecord {
    /// Respondent the moment belongs to
    pub respondent_id: u64,
    /// Unique moment identifier within the corpus
    pub moment_id: u64,
    /// Raw free-text response
    pub raw_text: String,
    /// Number of sentences in the response
    #[serde(default = "default_sentence_count")]
    pub sentence_count: u32,
    /// Optional externally assigned category tag
    #[serde(default)]
    pub category_label: Option<String>,
}

fn default_sentence_count() -> u32 {
    1
}

/// Demographic covariates for one respondent.
///
/// Numeric encodings follow the caller's filtering step: `parenthood` and
/// `marital` are 0/1, `gender` is 0/1 when present. Gender is carried for
/// reporting but never enters the clustering feature matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentDemographics {
    pub respondent_id: u64,
    pub age: f64,
    #[serde(default)]
    pub gender: Option<u8>,
    pub parenthood: u8,
    pub marital: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moment_record_defaults() {
        let json = r#"{"respondent_id": 7, "moment_id": 1, "raw_text": "I went hiking"}"#;
        let record: MomentRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.respondent_id, 7);
        assert_eq!(record.sentence_count, 1);
        assert!(record.category_label.is_none());
    }

    #[test]
    fn test_demographics_missing_required_field() {
        let json = r#"{"respondent_id": 7, "age": 30.0, "parenthood": 1}"#;
        let result: Result<RespondentDemographics, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
