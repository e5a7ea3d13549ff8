//! Segmentation of respondents into personas
//!
//! Stage A produces within/between sum-of-squares diagnostics over a
//! candidate range of cluster counts; the final count is a caller-supplied
//! choice made from that curve, never inferred here. Stage B runs the
//! final seeded k-means and packages centroid profiles with member counts.

use super::aggregator::RespondentFeatures;
use super::SegmentError;
use crate::models::{KMeans, KMeansConfig};
use ndarray::Array2;
use serde::Serialize;

/// Diagnostics for one candidate cluster count.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDiagnostics {
    pub k: usize,
    pub total_within_ss: f64,
    pub between_ss: f64,
}

/// One cluster of the final segmentation.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterProfile {
    pub cluster_id: usize,
    /// Centroid over the feature columns (age, parenthood, marital,
    /// then one dominant-topic indicator per topic)
    pub centroid: Vec<f64>,
    pub member_count: usize,
}

/// Final clustering of the respondent population.
#[derive(Debug, Clone, Serialize)]
pub struct Segmentation {
    pub clusters: Vec<ClusterProfile>,
    /// (respondent_id, cluster_id) per respondent, in feature-row order
    pub assignments: Vec<(u64, usize)>,
    pub total_within_ss: f64,
    pub between_ss: f64,
    pub converged: bool,
}

/// Build the clustering feature matrix from respondent features.
///
/// Columns: age, parenthood, marital, then the one-hot dominant-topic
/// indicators. Mean gamma and gender stay out of the matrix; gender is
/// excluded by design, and the dominant-topic indicator already encodes
/// the behavioral signal used for personas.
pub fn feature_matrix(features: &[RespondentFeatures]) -> Array2<f64> {
    let n_topics = features.first().map(|f| f.mean_gamma.len()).unwrap_or(0);
    let n_cols = 3 + n_topics;

    let mut matrix = Array2::zeros((features.len(), n_cols));
    for (row_idx, feature) in features.iter().enumerate() {
        matrix[[row_idx, 0]] = feature.age;
        matrix[[row_idx, 1]] = feature.parenthood;
        matrix[[row_idx, 2]] = feature.marital;
        matrix[[row_idx, 3 + feature.dominant_topic]] = 1.0;
    }
    matrix
}

/// Stage A: within/between sum-of-squares for each k in `1..=k_max`.
///
/// The candidate range is capped at the number of respondents. Selecting
/// the final k from the curve is a human decision.
pub fn elbow_curve(
    data: &Array2<f64>,
    k_max: usize,
    base: &KMeansConfig,
) -> Result<Vec<ClusterDiagnostics>, SegmentError> {
    if data.nrows() == 0 {
        return Err(SegmentError::EmptyInput);
    }

    let upper = k_max.min(data.nrows());
    let mut curve = Vec::with_capacity(upper);
    for k in 1..=upper {
        let kmeans = KMeans::new(base.clone().with_k(k))?;
        let result = kmeans.fit(data)?;
        curve.push(ClusterDiagnostics {
            k,
            total_within_ss: result.total_within_ss,
            between_ss: result.between_ss,
        });
    }
    Ok(curve)
}

/// Stage B: final clustering with a caller-chosen k.
pub fn segment(
    features: &[RespondentFeatures],
    config: &KMeansConfig,
) -> Result<Segmentation, SegmentError> {
    if features.is_empty() {
        return Err(SegmentError::EmptyInput);
    }

    let data = feature_matrix(features);
    let kmeans = KMeans::new(config.clone())?;
    let result = kmeans.fit(&data)?;

    let counts = result.member_counts(config.k);
    let clusters = (0..config.k)
        .map(|cluster_id| ClusterProfile {
            cluster_id,
            centroid: result.centroids.row(cluster_id).to_vec(),
            member_count: counts[cluster_id],
        })
        .collect();

    let assignments = features
        .iter()
        .zip(result.assignments.iter())
        .map(|(feature, &cluster)| (feature.respondent_id, cluster))
        .collect();

    Ok(Segmentation {
        clusters,
        assignments,
        total_within_ss: result.total_within_ss,
        between_ss: result.between_ss,
        converged: result.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kmeans::total_sum_of_squares;

    fn feature(id: u64, age: f64, dominant: usize) -> RespondentFeatures {
        let mut mean_gamma = vec![0.1; 3];
        mean_gamma[dominant] = 0.8;
        RespondentFeatures {
            respondent_id: id,
            age,
            parenthood: 0.0,
            marital: 1.0,
            mean_gamma,
            dominant_topic: dominant,
        }
    }

    fn sample_features() -> Vec<RespondentFeatures> {
        vec![
            feature(1, 25.0, 0),
            feature(2, 26.0, 0),
            feature(3, 24.0, 0),
            feature(4, 61.0, 2),
            feature(5, 60.0, 2),
            feature(6, 62.0, 2),
        ]
    }

    #[test]
    fn test_feature_matrix_layout_excludes_gender() {
        let features = sample_features();
        let matrix = feature_matrix(&features);

        // age, parenthood, marital + 3 topic indicators
        assert_eq!(matrix.shape(), &[6, 6]);
        assert_eq!(matrix[[0, 0]], 25.0);
        assert_eq!(matrix[[0, 3]], 1.0);
        assert_eq!(matrix[[3, 5]], 1.0);
        // exactly one indicator per row
        for row in matrix.rows() {
            let indicator_sum: f64 = row.iter().skip(3).sum();
            assert_eq!(indicator_sum, 1.0);
        }
    }

    #[test]
    fn test_elbow_curve_k1_matches_total_variance() {
        let features = sample_features();
        let data = feature_matrix(&features);
        let curve = elbow_curve(&data, 4, &KMeansConfig::new(1).seed(5)).unwrap();

        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0].k, 1);
        assert!((curve[0].between_ss - 0.0).abs() < 1e-9);
        assert!((curve[0].total_within_ss - total_sum_of_squares(&data)).abs() < 1e-9);
    }

    #[test]
    fn test_elbow_curve_monotonicity() {
        let features = sample_features();
        let data = feature_matrix(&features);
        let curve = elbow_curve(&data, 5, &KMeansConfig::new(1).seed(11)).unwrap();

        for pair in curve.windows(2) {
            assert!(pair[1].total_within_ss <= pair[0].total_within_ss + 1e-9);
            assert!(pair[1].between_ss + 1e-9 >= pair[0].between_ss);
        }
    }

    #[test]
    fn test_segment_assigns_every_respondent_once() {
        let features = sample_features();
        let segmentation = segment(&features, &KMeansConfig::new(2).seed(42)).unwrap();

        assert_eq!(segmentation.assignments.len(), 6);
        let member_total: usize = segmentation.clusters.iter().map(|c| c.member_count).sum();
        assert_eq!(member_total, 6);

        // the two age/topic groups separate
        let first = segmentation.assignments[0].1;
        assert_eq!(segmentation.assignments[1].1, first);
        assert_eq!(segmentation.assignments[2].1, first);
        assert_ne!(segmentation.assignments[3].1, first);
    }

    #[test]
    fn test_segment_is_deterministic() {
        let features = sample_features();
        let config = KMeansConfig::new(2).seed(9);

        let first = segment(&features, &config).unwrap();
        let second = segment(&features, &config).unwrap();

        assert_eq!(first.assignments, second.assignments);
        for (a, b) in first.clusters.iter().zip(second.clusters.iter()) {
            assert_eq!(a.centroid, b.centroid);
            assert_eq!(a.member_count, b.member_count);
        }
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            segment(&[], &KMeansConfig::new(2)),
            Err(SegmentError::EmptyInput)
        ));
    }
}
