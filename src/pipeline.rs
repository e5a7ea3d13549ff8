//! End-to-end persona pipeline
//!
//! Runs the five stages in order: normalize text, build the document-term
//! matrix, fit LDA, aggregate per-respondent features, and segment. Each
//! stage produces a fresh artifact consumed by the next; nothing is
//! mutated across stage boundaries.

use crate::models::{
    BetaEntry, CancelFlag, FixedBudget, KMeansConfig, KMeansError, Lda, LdaConfig, LdaError,
    TopicTerms,
};
use crate::preprocessing::{DocumentTermMatrix, Normalizer};
use crate::segments::{
    aggregate_respondents, elbow_curve, feature_matrix, segment, ClusterDiagnostics,
    RespondentFeatures, SegmentError, Segmentation,
};
use crate::types::{MomentRecord, RespondentDemographics};
use log::{debug, info};
use thiserror::Error;

/// Errors surfaced by the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Lda(#[from] LdaError),

    #[error(transparent)]
    KMeans(#[from] KMeansError),

    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// Pipeline configuration.
///
/// `kmeans.k` is the human-chosen final cluster count, picked from the
/// elbow diagnostics of a previous run; it is never inferred here.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Topic model configuration
    pub lda: LdaConfig,
    /// Final clustering configuration
    pub kmeans: KMeansConfig,
    /// Upper bound of the elbow-curve candidate range
    pub k_max: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lda: LdaConfig::default(),
            kmeans: KMeansConfig::default(),
            k_max: 10,
        }
    }
}

/// Terms reported per topic in `PersonaReport::topics`.
const TOP_TERMS_PER_TOPIC: usize = 10;

/// Everything the pipeline exposes to external reporting.
#[derive(Debug, Clone)]
pub struct PersonaReport {
    /// `(topic, term, probability)` rows of the topic-term distribution
    pub beta_table: Vec<BetaEntry>,
    /// Top terms and prevalence per topic
    pub topics: Vec<TopicTerms>,
    /// One feature row per respondent
    pub respondents: Vec<RespondentFeatures>,
    /// Within/between sum-of-squares per candidate cluster count
    pub elbow: Vec<ClusterDiagnostics>,
    /// Final clustering with centroid profiles and assignments
    pub segmentation: Segmentation,
    /// Documents dropped during normalization (fewer than 2 tokens)
    pub dropped_documents: usize,
    /// Documents that reached the topic model
    pub retained_documents: usize,
    /// False when the selected Gibbs chain was cancelled early
    pub lda_converged: bool,
}

/// The five-stage persona pipeline.
#[derive(Debug)]
pub struct PersonaPipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
}

impl PersonaPipeline {
    /// Create a pipeline, validating both model configurations up front.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Lda::new(config.lda.clone())?;
        crate::models::KMeans::new(config.kmeans.clone())?;
        if config.k_max == 0 {
            return Err(PipelineError::Input(
                "k_max must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            config,
            normalizer: Normalizer::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline.
    pub fn run(
        &self,
        moments: &[MomentRecord],
        demographics: &[RespondentDemographics],
    ) -> Result<PersonaReport, PipelineError> {
        self.run_cancellable(moments, demographics, &CancelFlag::new())
    }

    /// Run the full pipeline with a cooperative cancellation flag.
    ///
    /// Cancellation only interrupts the Gibbs sampler, the dominant cost;
    /// the remaining stages complete from the best-effort topic model.
    pub fn run_cancellable(
        &self,
        moments: &[MomentRecord],
        demographics: &[RespondentDemographics],
        cancel: &CancelFlag,
    ) -> Result<PersonaReport, PipelineError> {
        for moment in moments {
            if moment.raw_text.trim().is_empty() {
                return Err(PipelineError::Input(format!(
                    "moment {} has empty text",
                    moment.moment_id
                )));
            }
        }

        // Stage 1: normalize
        let raw_texts: Vec<String> = moments.iter().map(|m| m.raw_text.clone()).collect();
        let normalized = self.normalizer.normalize_corpus(&raw_texts);
        info!(
            "normalized corpus: {} documents retained, {} dropped, {} stems canonicalized",
            normalized.documents.len(),
            normalized.dropped,
            normalized.canonical.len()
        );

        // Stage 2: document-term matrix
        let document_ids: Vec<u64> = normalized
            .retained
            .iter()
            .map(|&idx| moments[idx].moment_id)
            .collect();
        let doc_respondents: Vec<u64> = normalized
            .retained
            .iter()
            .map(|&idx| moments[idx].respondent_id)
            .collect();
        let dtm = DocumentTermMatrix::from_documents(&normalized.documents, document_ids);
        debug!(
            "document-term matrix: {} x {}",
            dtm.n_documents(),
            dtm.n_terms()
        );

        // Stage 3: topic model
        let mut lda = Lda::new(self.config.lda.clone())?;
        lda.fit_with(&dtm, &mut FixedBudget, cancel)?;
        info!(
            "LDA fitted: chain {} selected, log-likelihood {:.2}",
            lda.selected_chain(),
            lda.log_likelihood_history().last().copied().unwrap_or(0.0)
        );

        // Stage 4: respondent aggregation
        let respondents = aggregate_respondents(lda.gamma()?, &doc_respondents, demographics)?;

        // Stage 5: segmentation
        let data = feature_matrix(&respondents);
        let elbow = elbow_curve(&data, self.config.k_max, &self.config.kmeans)?;
        let segmentation = segment(&respondents, &self.config.kmeans)?;
        info!(
            "segmented {} respondents into {} clusters (within-SS {:.3})",
            respondents.len(),
            segmentation.clusters.len(),
            segmentation.total_within_ss
        );

        Ok(PersonaReport {
            beta_table: lda.beta_table()?,
            topics: lda.top_terms(TOP_TERMS_PER_TOPIC)?,
            respondents,
            elbow,
            segmentation,
            dropped_documents: normalized.dropped,
            retained_documents: dtm.n_documents(),
            lda_converged: lda.converged(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moment(respondent_id: u64, moment_id: u64, text: &str) -> MomentRecord {
        MomentRecord {
            respondent_id,
            moment_id,
            raw_text: text.to_string(),
            sentence_count: 1,
            category_label: None,
        }
    }

    fn demo(respondent_id: u64, age: f64, parenthood: u8, marital: u8) -> RespondentDemographics {
        RespondentDemographics {
            respondent_id,
            age,
            gender: Some(0),
            parenthood,
            marital,
        }
    }

    /// Two respondent groups: food moments and outdoor moments.
    fn sample_survey() -> (Vec<MomentRecord>, Vec<RespondentDemographics>) {
        let moments = vec![
            moment(1, 100, "I ate delicious pizza with my family at dinner"),
            moment(1, 101, "We cooked a wonderful dinner and ate pizza together"),
            moment(2, 102, "My family enjoyed pizza and cake at a birthday dinner"),
            moment(2, 103, "I baked bread and we ate a great dinner"),
            moment(3, 104, "I walked my dog in the park this morning"),
            moment(3, 105, "My dog ran around the park chasing a ball"),
            moment(4, 106, "We hiked a mountain trail and walked in the park"),
            moment(4, 107, "I took a long walk with my dog outside"),
        ];
        let demographics = vec![
            demo(1, 34.0, 1, 1),
            demo(2, 36.0, 1, 1),
            demo(3, 22.0, 0, 0),
            demo(4, 24.0, 0, 0),
        ];
        (moments, demographics)
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            lda: LdaConfig::new(2)
                .total_iterations(200)
                .burn_in(50)
                .thin(5)
                .seed(42),
            kmeans: KMeansConfig::new(2).seed(42),
            k_max: 4,
        }
    }

    #[test]
    fn test_invalid_configs_are_rejected_up_front() {
        let mut config = test_config();
        config.lda = LdaConfig::new(0);
        assert!(PersonaPipeline::new(config).is_err());

        let mut config = test_config();
        config.kmeans = KMeansConfig::new(0);
        assert!(PersonaPipeline::new(config).is_err());

        let mut config = test_config();
        config.k_max = 0;
        assert!(PersonaPipeline::new(config).is_err());
    }

    #[test]
    fn test_empty_moment_text_is_an_input_error() {
        let pipeline = PersonaPipeline::new(test_config()).unwrap();
        let moments = vec![moment(1, 1, "   ")];
        let result = pipeline.run(&moments, &[demo(1, 30.0, 0, 0)]);
        assert!(matches!(result, Err(PipelineError::Input(_))));
    }

    #[test]
    fn test_all_degenerate_corpus_is_fatal() {
        let pipeline = PersonaPipeline::new(test_config()).unwrap();
        // every document normalizes to fewer than 2 tokens
        let moments = vec![moment(1, 1, "the of and"), moment(1, 2, "pizza")];
        let result = pipeline.run(&moments, &[demo(1, 30.0, 0, 0)]);
        assert!(matches!(
            result,
            Err(PipelineError::Lda(LdaError::EmptyMatrix))
        ));
    }

    #[test]
    fn test_end_to_end_report_invariants() {
        let (moments, demographics) = sample_survey();
        let pipeline = PersonaPipeline::new(test_config()).unwrap();
        let report = pipeline.run(&moments, &demographics).unwrap();

        assert_eq!(report.retained_documents, 8);
        assert_eq!(report.dropped_documents, 0);
        assert!(report.lda_converged);

        // one feature row per respondent, each with one dominant topic
        assert_eq!(report.respondents.len(), 4);
        for row in &report.respondents {
            assert!((row.mean_gamma.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            assert_eq!(
                row.dominant_one_hot().iter().filter(|&&v| v == 1.0).count(),
                1
            );
        }

        // top-terms summary mirrors the beta table
        assert_eq!(report.topics.len(), 2);
        for topic in &report.topics {
            assert!(!topic.top_words.is_empty());
            for pair in topic.top_words.windows(2) {
                assert!(pair[0].1 >= pair[1].1);
            }
        }

        // beta rows sum to 1 per topic
        for topic_id in 0..2 {
            let total: f64 = report
                .beta_table
                .iter()
                .filter(|row| row.topic_id == topic_id)
                .map(|row| row.probability)
                .sum();
            assert!((total - 1.0).abs() < 1e-6);
        }

        // elbow curve covers 1..=k_max and every respondent is assigned
        assert_eq!(report.elbow.len(), 4);
        assert_eq!(report.segmentation.assignments.len(), 4);
        let members: usize = report
            .segmentation
            .clusters
            .iter()
            .map(|c| c.member_count)
            .sum();
        assert_eq!(members, 4);
    }

    #[test]
    fn test_pipeline_is_reproducible() {
        let (moments, demographics) = sample_survey();
        let pipeline = PersonaPipeline::new(test_config()).unwrap();

        let first = pipeline.run(&moments, &demographics).unwrap();
        let second = pipeline.run(&moments, &demographics).unwrap();

        assert_eq!(
            first.segmentation.assignments,
            second.segmentation.assignments
        );
        for (a, b) in first.respondents.iter().zip(second.respondents.iter()) {
            assert_eq!(a.respondent_id, b.respondent_id);
            assert_eq!(a.mean_gamma, b.mean_gamma);
            assert_eq!(a.dominant_topic, b.dominant_topic);
        }
        for (a, b) in first.beta_table.iter().zip(second.beta_table.iter()) {
            assert_eq!(a.probability, b.probability);
        }
    }

    #[test]
    fn test_scenario_inflected_forms_share_a_column() {
        // three documents; the first two both contain "ate"
        let moments = vec![
            moment(1, 1, "I ate a big pizza today"),
            moment(2, 2, "I ate pizza yesterday too"),
            moment(3, 3, "My dog ran in the park"),
        ];

        let normalizer = Normalizer::new();
        let raw: Vec<String> = moments.iter().map(|m| m.raw_text.clone()).collect();
        let normalized = normalizer.normalize_corpus(&raw);
        assert_eq!(normalized.documents.len(), 3);

        let dtm = DocumentTermMatrix::from_documents(&normalized.documents, vec![1, 2, 3]);
        let stem = normalizer.stem("ate");
        let canonical = normalized.canonical.canonical_for(&stem).unwrap().to_string();

        assert_eq!(dtm.count(0, &canonical), Some(1.0));
        assert_eq!(dtm.count(1, &canonical), Some(1.0));
        assert_eq!(dtm.count(2, &canonical), Some(0.0));
    }
}
