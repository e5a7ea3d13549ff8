//! Respondent-level feature aggregation
//!
//! Joins per-document topic distributions to respondent ids and collapses
//! them into one row per respondent: demographic covariates, mean topic
//! weights, and a dominant-topic indicator.

use super::SegmentError;
use crate::models::lda::argmax_row;
use crate::types::RespondentDemographics;
use hashbrown::HashMap;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the respondent feature table.
///
/// Demographic values are reduced with `max` over the respondent's rows.
/// Post-filter data is expected to be constant per respondent, so the
/// reducer normally just picks that constant; when values do vary, the
/// maximum wins. Gender is intentionally absent: it never enters the
/// segmentation features.
#[derive(Debug, Clone, Serialize)]
pub struct RespondentFeatures {
    pub respondent_id: u64,
    pub age: f64,
    pub parenthood: f64,
    pub marital: f64,
    /// Mean gamma per topic over the respondent's documents
    pub mean_gamma: Vec<f64>,
    /// Index of the topic with the highest mean gamma (ties to lowest)
    pub dominant_topic: usize,
}

impl RespondentFeatures {
    /// One-hot dominant-topic indicator vector.
    pub fn dominant_one_hot(&self) -> Vec<f64> {
        let mut one_hot = vec![0.0; self.mean_gamma.len()];
        one_hot[self.dominant_topic] = 1.0;
        one_hot
    }
}

/// Collapse document-level gamma rows into one feature row per respondent.
///
/// `doc_respondents` maps each gamma row to its respondent id. Output is
/// sorted by respondent id. A respondent with documents but no
/// demographics row is an input error.
pub fn aggregate_respondents(
    gamma: &Array2<f64>,
    doc_respondents: &[u64],
    demographics: &[RespondentDemographics],
) -> Result<Vec<RespondentFeatures>, SegmentError> {
    if gamma.nrows() != doc_respondents.len() {
        return Err(SegmentError::DimensionMismatch(format!(
            "{} gamma rows but {} respondent ids",
            gamma.nrows(),
            doc_respondents.len()
        )));
    }

    // max-reduce demographics per respondent
    let mut demo_map: HashMap<u64, (f64, f64, f64)> = HashMap::new();
    for demo in demographics {
        let entry = demo_map
            .entry(demo.respondent_id)
            .or_insert((f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY));
        entry.0 = entry.0.max(demo.age);
        entry.1 = entry.1.max(demo.parenthood as f64);
        entry.2 = entry.2.max(demo.marital as f64);
    }

    // group document rows per respondent, sorted by id
    let mut doc_groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (doc_idx, &respondent_id) in doc_respondents.iter().enumerate() {
        doc_groups.entry(respondent_id).or_default().push(doc_idx);
    }

    let n_topics = gamma.ncols();
    let mut features = Vec::with_capacity(doc_groups.len());

    for (respondent_id, doc_indices) in doc_groups {
        let &(age, parenthood, marital) = demo_map
            .get(&respondent_id)
            .ok_or(SegmentError::MissingDemographics(respondent_id))?;

        let mut mean_gamma = Array1::<f64>::zeros(n_topics);
        for &doc_idx in &doc_indices {
            mean_gamma += &gamma.row(doc_idx);
        }
        mean_gamma /= doc_indices.len() as f64;

        let dominant_topic = argmax_row(&mean_gamma);

        features.push(RespondentFeatures {
            respondent_id,
            age,
            parenthood,
            marital,
            mean_gamma: mean_gamma.to_vec(),
            dominant_topic,
        });
    }

    Ok(features)
}
