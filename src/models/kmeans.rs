//! Seeded k-means clustering
//!
//! Iterative relocation: assign each point to its nearest centroid by
//! Euclidean distance, recompute centroids as cluster means, repeat until
//! assignments stabilize or the iteration cap is reached. Restarts run
//! from independent seeded initializations and the result with the lowest
//! total within-cluster sum of squares is kept, so a fixed seed and input
//! ordering always reproduce the same output.

use log::warn;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use thiserror::Error;

/// Errors that can occur during k-means computation
#[derive(Error, Debug)]
pub enum KMeansError {
    #[error("Number of clusters must be positive")]
    InvalidClusterCount,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Input matrix has no rows or no columns")]
    EmptyInput,

    #[error("Cannot form {k} clusters from {points} points")]
    TooFewPoints { points: usize, k: usize },
}

/// Clustering configuration.
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,
    /// Iteration cap per start
    pub max_iterations: usize,
    /// Independent restarts; start `i` uses `seed + i`
    pub n_starts: usize,
    /// Base random seed
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 6,
            max_iterations: 100,
            n_starts: 10,
            seed: 0,
        }
    }
}

impl KMeansConfig {
    /// Create a configuration with the given cluster count.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the iteration cap
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the restart count
    pub fn n_starts(mut self, n: usize) -> Self {
        self.n_starts = n;
        self
    }

    /// Set the base random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the cluster count, keeping the other parameters.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }
}

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster centroids (k x n_features)
    pub centroids: Array2<f64>,
    /// Cluster id per input row
    pub assignments: Vec<usize>,
    /// Total within-cluster sum of squares
    pub total_within_ss: f64,
    /// Between-cluster sum of squares
    pub between_ss: f64,
    /// False when the kept start hit the iteration cap
    pub converged: bool,
    /// Iterations used by the kept start
    pub n_iterations: usize,
}

impl KMeansResult {
    /// Number of members per cluster.
    pub fn member_counts(&self, k: usize) -> Vec<usize> {
        let mut counts = vec![0usize; k];
        for &cluster in &self.assignments {
            counts[cluster] += 1;
        }
        counts
    }
}

/// K-means model.
#[derive(Debug, Clone)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    /// Create a new model, validating the configuration.
    pub fn new(config: KMeansConfig) -> Result<Self, KMeansError> {
        if config.k == 0 {
            return Err(KMeansError::InvalidClusterCount);
        }
        if config.max_iterations == 0 {
            return Err(KMeansError::InvalidParameter(
                "max_iterations must be positive".into(),
            ));
        }
        if config.n_starts == 0 {
            return Err(KMeansError::InvalidParameter(
                "n_starts must be at least 1".into(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Cluster the rows of `data`.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansResult, KMeansError> {
        let n = data.nrows();
        let k = self.config.k;

        if n == 0 || data.ncols() == 0 {
            return Err(KMeansError::EmptyInput);
        }
        if n < k {
            return Err(KMeansError::TooFewPoints { points: n, k });
        }

        let tot_ss = total_sum_of_squares(data);

        let mut best: Option<KMeansResult> = None;
        for start in 0..self.config.n_starts {
            let seed = self.config.seed + start as u64;
            let candidate = self.run_single(data, seed);

            let better = match &best {
                Some(current) => candidate.total_within_ss < current.total_within_ss,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }

        // n_starts >= 1 is enforced in new()
        let mut result = best.expect("at least one start");
        result.between_ss = (tot_ss - result.total_within_ss).max(0.0);

        if !result.converged {
            warn!(
                "k-means did not stabilize within {} iterations; result is best-effort",
                self.config.max_iterations
            );
        }

        Ok(result)
    }

    /// One seeded run of iterative relocation.
    fn run_single(&self, data: &Array2<f64>, seed: u64) -> KMeansResult {
        let n = data.nrows();
        let d = data.ncols();
        let k = self.config.k;
        let mut rng = StdRng::seed_from_u64(seed);

        // k distinct rows as initial centroids
        let chosen = rand::seq::index::sample(&mut rng, n, k);
        let mut centroids = Array2::zeros((k, d));
        for (cluster, row_idx) in chosen.iter().enumerate() {
            centroids.row_mut(cluster).assign(&data.row(row_idx));
        }

        let mut assignments = vec![0usize; n];
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let changed = assign_rows(data, &centroids, &mut assignments);

            if iter > 0 && !changed {
                converged = true;
                break;
            }

            // update step
            let mut sums = Array2::<f64>::zeros((k, d));
            let mut counts = vec![0usize; k];
            for i in 0..n {
                let cluster = assignments[i];
                counts[cluster] += 1;
                let mut sum_row = sums.row_mut(cluster);
                sum_row += &data.row(i);
            }

            for c in 0..k {
                if counts[c] > 0 {
                    let mut centroid = centroids.row_mut(c);
                    centroid.assign(&sums.row(c));
                    centroid /= counts[c] as f64;
                } else {
                    // re-seed an empty cluster from the point farthest
                    // from its current centroid
                    let far = farthest_point(data, &centroids, &assignments);
                    centroids.row_mut(c).assign(&data.row(far));
                }
            }
        }

        // a cap-hit run leaves the centroids one update ahead of the
        // assignments; re-align before reporting
        if !converged {
            assign_rows(data, &centroids, &mut assignments);
        }

        let total_within_ss: f64 = (0..n)
            .map(|i| squared_distance(&data.row(i), &centroids.row(assignments[i])))
            .sum();

        KMeansResult {
            centroids,
            assignments,
            total_within_ss,
            between_ss: 0.0,
            converged,
            n_iterations: iterations,
        }
    }
}

fn squared_distance(a: &ndarray::ArrayView1<f64>, b: &ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Assign each row to its nearest centroid. Returns true when any
/// assignment changed.
fn assign_rows(data: &Array2<f64>, centroids: &Array2<f64>, assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for i in 0..data.nrows() {
        let point = data.row(i);
        let mut best_cluster = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.rows().into_iter().enumerate() {
            let dist = squared_distance(&point, &centroid);
            if dist < best_dist {
                best_dist = dist;
                best_cluster = c;
            }
        }
        if assignments[i] != best_cluster {
            assignments[i] = best_cluster;
            changed = true;
        }
    }
    changed
}

/// Sum of squared distances of all rows to the global mean.
pub fn total_sum_of_squares(data: &Array2<f64>) -> f64 {
    let mean: Array1<f64> = match data.mean_axis(Axis(0)) {
        Some(mean) => mean,
        None => return 0.0,
    };
    data.rows()
        .into_iter()
        .map(|row| squared_distance(&row, &mean.view()))
        .sum()
}

/// Index of the point with the greatest distance to its assigned centroid.
fn farthest_point(data: &Array2<f64>, centroids: &Array2<f64>, assignments: &[usize]) -> usize {
    let mut far = 0;
    let mut far_dist = -1.0;
    for i in 0..data.nrows() {
        let dist = squared_distance(&data.row(i), &centroids.row(assignments[i]));
        if dist > far_dist {
            far_dist = dist;
            far = i;
        }
    }
    far
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nine points in three tight groups.
    fn create_test_data() -> Array2<f64> {
        Array2::from_shape_vec(
            (9, 2),
            vec![
                0.0, 0.0, 0.1, 0.0, 0.0, 0.1, //
                5.0, 5.0, 5.1, 5.0, 5.0, 5.1, //
                10.0, 0.0, 10.1, 0.0, 10.0, 0.1,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(KMeans::new(KMeansConfig::new(0)).is_err());
        assert!(KMeans::new(KMeansConfig::new(2).max_iterations(0)).is_err());
        assert!(KMeans::new(KMeansConfig::new(2).n_starts(0)).is_err());
        assert!(KMeans::new(KMeansConfig::new(2)).is_ok());
    }

    #[test]
    fn test_empty_and_undersized_input() {
        let kmeans = KMeans::new(KMeansConfig::new(3)).unwrap();

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(kmeans.fit(&empty), Err(KMeansError::EmptyInput)));

        let two_points = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!(matches!(
            kmeans.fit(&two_points),
            Err(KMeansError::TooFewPoints { points: 2, k: 3 })
        ));
    }

    #[test]
    fn test_fit_is_deterministic_for_fixed_seed() {
        let data = create_test_data();
        let kmeans = KMeans::new(KMeansConfig::new(3).seed(42)).unwrap();

        let first = kmeans.fit(&data).unwrap();
        let second = kmeans.fit(&data).unwrap();

        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.centroids, second.centroids);
        assert_eq!(first.total_within_ss, second.total_within_ss);
    }

    #[test]
    fn test_recovers_separated_groups() {
        let data = create_test_data();
        let kmeans = KMeans::new(KMeansConfig::new(3).seed(1)).unwrap();
        let result = kmeans.fit(&data).unwrap();

        assert!(result.converged);
        // points within each group share a cluster
        for group in 0..3 {
            let base = result.assignments[group * 3];
            assert_eq!(result.assignments[group * 3 + 1], base);
            assert_eq!(result.assignments[group * 3 + 2], base);
        }
        // groups are distinct
        assert_ne!(result.assignments[0], result.assignments[3]);
        assert_ne!(result.assignments[3], result.assignments[6]);

        let counts = result.member_counts(3);
        assert_eq!(counts, vec![3, 3, 3]);
    }

    #[test]
    fn test_capped_run_keeps_assignments_consistent_with_centroids() {
        let data = create_test_data();
        let config = KMeansConfig::new(3).max_iterations(1).n_starts(1).seed(2);
        let result = KMeans::new(config).unwrap().fit(&data).unwrap();

        assert!(!result.converged);
        // every point sits in the cluster of its nearest reported centroid
        for i in 0..data.nrows() {
            let assigned = squared_distance(
                &data.row(i),
                &result.centroids.row(result.assignments[i]),
            );
            for c in 0..3 {
                let dist = squared_distance(&data.row(i), &result.centroids.row(c));
                assert!(assigned <= dist + 1e-12);
            }
        }
    }

    #[test]
    fn test_single_cluster_decomposition() {
        let data = create_test_data();
        let kmeans = KMeans::new(KMeansConfig::new(1).seed(0)).unwrap();
        let result = kmeans.fit(&data).unwrap();

        let tot_ss = total_sum_of_squares(&data);
        assert!((result.between_ss - 0.0).abs() < 1e-9);
        assert!((result.total_within_ss - tot_ss).abs() < 1e-9);
    }

    #[test]
    fn test_within_ss_non_increasing_over_k() {
        let data = create_test_data();

        let mut previous = f64::INFINITY;
        for k in 1..=4 {
            let kmeans = KMeans::new(KMeansConfig::new(k).seed(3)).unwrap();
            let result = kmeans.fit(&data).unwrap();
            assert!(
                result.total_within_ss <= previous + 1e-9,
                "within-SS increased at k={k}"
            );
            previous = result.total_within_ss;
        }
    }
}
