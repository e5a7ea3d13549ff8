//! Latent Dirichlet Allocation (LDA)
//!
//! Collapsed Gibbs sampling over token-level topic assignments with
//! symmetric Dirichlet priors. Supports burn-in, thinned sample
//! collection, and multiple independent chains; the chain with the best
//! final log-likelihood is kept, which makes the result deterministic
//! for a fixed seed regardless of how chains are scheduled.

use crate::preprocessing::DocumentTermMatrix;
use log::{debug, warn};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during LDA computation
#[derive(Error, Debug)]
pub enum LdaError {
    #[error("Number of topics must be positive")]
    InvalidTopicCount,

    #[error("Invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error("Document-term matrix has no rows or no columns")]
    EmptyMatrix,

    #[error("Model not fitted yet")]
    NotFitted,
}

/// Sampling configuration for the Gibbs chains.
///
/// The seed is mandatory state: every randomized stage of the pipeline is
/// reproducible by construction.
#[derive(Debug, Clone)]
pub struct LdaConfig {
    /// Number of topics
    pub n_topics: usize,
    /// Document-topic prior (alpha)
    pub alpha: f64,
    /// Topic-word prior (beta/eta)
    pub beta: f64,
    /// Total Gibbs sampling iterations per chain
    pub total_iterations: usize,
    /// Iterations discarded before collecting statistics
    pub burn_in: usize,
    /// Collect statistics every `thin` post-burn-in iterations
    pub thin: usize,
    /// Number of independent chains; chain `i` uses `seed + i`
    pub n_chains: usize,
    /// Base random seed
    pub seed: u64,
}

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            n_topics: 8,
            alpha: 0.1,
            beta: 0.01,
            total_iterations: 1000,
            burn_in: 100,
            thin: 10,
            n_chains: 1,
            seed: 0,
        }
    }
}

impl LdaConfig {
    /// Create a new configuration with the given number of topics.
    pub fn new(n_topics: usize) -> Self {
        Self {
            n_topics,
            ..Default::default()
        }
    }

    /// Set alpha (document-topic prior)
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set beta (topic-word prior)
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Set total iterations per chain
    pub fn total_iterations(mut self, n: usize) -> Self {
        self.total_iterations = n;
        self
    }

    /// Set burn-in period
    pub fn burn_in(mut self, n: usize) -> Self {
        self.burn_in = n;
        self
    }

    /// Set thinning interval
    pub fn thin(mut self, n: usize) -> Self {
        self.thin = n;
        self
    }

    /// Set number of independent chains
    pub fn n_chains(mut self, n: usize) -> Self {
        self.n_chains = n;
        self
    }

    /// Set base random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Capability consulted once per outer sampling iteration.
///
/// The default implementation runs the chain to its fixed budget; callers
/// who track convergence themselves can stop a chain early.
pub trait ConvergenceCheck {
    /// Called before each chain starts. The same instance is consulted by
    /// every chain in turn, so stateful implementations clear their
    /// per-chain history here.
    fn reset(&mut self) {}

    /// Return true to stop the current chain after this iteration.
    fn should_stop(&mut self, iteration: usize, log_likelihood: f64) -> bool;
}

/// Runs every chain to the configured iteration budget.
#[derive(Debug, Default)]
pub struct FixedBudget;

impl ConvergenceCheck for FixedBudget {
    fn should_stop(&mut self, _iteration: usize, _log_likelihood: f64) -> bool {
        false
    }
}

/// Cooperative cancellation flag checked between sampler iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of any in-flight sampling.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Top terms for one topic.
#[derive(Debug, Clone, Serialize)]
pub struct TopicTerms {
    /// Topic index
    pub topic_id: usize,
    /// Top words with their probabilities
    pub top_words: Vec<(String, f64)>,
    /// Mean topic weight across documents
    pub prevalence: f64,
}

/// One `(topic, term, probability)` row of the beta output table.
#[derive(Debug, Clone, Serialize)]
pub struct BetaEntry {
    pub topic_id: usize,
    pub term: String,
    pub probability: f64,
}

/// Result of one Gibbs chain.
struct ChainOutcome {
    gamma: Array2<f64>,
    beta: Array2<f64>,
    log_likelihood: f64,
    history: Vec<f64>,
    converged: bool,
}

/// Latent Dirichlet Allocation model fitted by collapsed Gibbs sampling.
#[derive(Debug)]
pub struct Lda {
    config: LdaConfig,
    /// Posterior mean document-topic distribution: n_docs x n_topics
    gamma: Option<Array2<f64>>,
    /// Posterior mean topic-term distribution: n_topics x n_terms
    beta: Option<Array2<f64>>,
    /// Vocabulary terms, parallel to beta columns
    terms: Option<Vec<String>>,
    /// Post-burn-in log-likelihood history of the selected chain
    log_likelihood_history: Vec<f64>,
    /// Index of the selected chain
    selected_chain: usize,
    /// False when the selected chain was cancelled before its budget
    converged: bool,
}

impl Lda {
    /// Create a new LDA model, validating the configuration.
    pub fn new(config: LdaConfig) -> Result<Self, LdaError> {
        if config.n_topics == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        if config.alpha <= 0.0 {
            return Err(LdaError::InvalidParameter("alpha must be positive".into()));
        }
        if config.beta <= 0.0 {
            return Err(LdaError::InvalidParameter("beta must be positive".into()));
        }
        if config.total_iterations == 0 {
            return Err(LdaError::InvalidParameter(
                "total_iterations must be positive".into(),
            ));
        }
        if config.burn_in >= config.total_iterations {
            return Err(LdaError::InvalidParameter(
                "burn_in must be smaller than total_iterations".into(),
            ));
        }
        if config.thin == 0 {
            return Err(LdaError::InvalidParameter("thin must be at least 1".into()));
        }
        if config.n_chains == 0 {
            return Err(LdaError::InvalidParameter(
                "n_chains must be at least 1".into(),
            ));
        }

        Ok(Self {
            config,
            gamma: None,
            beta: None,
            terms: None,
            log_likelihood_history: Vec::new(),
            selected_chain: 0,
            converged: false,
        })
    }

    /// Fit the model with the default fixed-budget convergence behavior.
    pub fn fit(&mut self, dtm: &DocumentTermMatrix) -> Result<(), LdaError> {
        self.fit_with(dtm, &mut FixedBudget, &CancelFlag::new())
    }

    /// Fit the model with an injected convergence check and cancel flag.
    ///
    /// Chains run sequentially with seeds `seed + chain_index`; the chain
    /// with the highest final log-likelihood wins, ties going to the lowest
    /// chain index.
    pub fn fit_with(
        &mut self,
        dtm: &DocumentTermMatrix,
        check: &mut dyn ConvergenceCheck,
        cancel: &CancelFlag,
    ) -> Result<(), LdaError> {
        if dtm.is_degenerate() {
            return Err(LdaError::EmptyMatrix);
        }

        let n_words = dtm.n_terms();

        // Expand the count matrix into per-document token lists.
        let doc_tokens: Vec<Vec<usize>> = (0..dtm.n_documents())
            .map(|doc_idx| {
                let mut tokens = Vec::new();
                for word_idx in 0..n_words {
                    let count = dtm.matrix[[doc_idx, word_idx]] as usize;
                    for _ in 0..count {
                        tokens.push(word_idx);
                    }
                }
                tokens
            })
            .collect();

        let mut best: Option<(usize, ChainOutcome)> = None;
        for chain in 0..self.config.n_chains {
            let seed = self.config.seed + chain as u64;
            debug!("starting Gibbs chain {} with seed {}", chain, seed);
            check.reset();
            let outcome = self.run_chain(&doc_tokens, n_words, seed, check, cancel);
            debug!(
                "chain {} finished: log-likelihood {:.2}, converged {}",
                chain, outcome.log_likelihood, outcome.converged
            );

            let better = match &best {
                Some((_, current)) => outcome.log_likelihood > current.log_likelihood,
                None => true,
            };
            if better {
                best = Some((chain, outcome));
            }
        }

        // n_chains >= 1 is enforced in new()
        let (selected, outcome) = best.expect("at least one chain");

        self.gamma = Some(outcome.gamma);
        self.beta = Some(outcome.beta);
        self.terms = Some(dtm.terms.clone());
        self.log_likelihood_history = outcome.history;
        self.selected_chain = selected;
        self.converged = outcome.converged;

        Ok(())
    }

    /// Run a single Gibbs chain to completion, cancellation, or early stop.
    fn run_chain(
        &self,
        doc_tokens: &[Vec<usize>],
        n_words: usize,
        seed: u64,
        check: &mut dyn ConvergenceCheck,
        cancel: &CancelFlag,
    ) -> ChainOutcome {
        let n_docs = doc_tokens.len();
        let n_topics = self.config.n_topics;
        let alpha = self.config.alpha;
        let beta = self.config.beta;
        let beta_sum = beta * n_words as f64;

        let mut rng = StdRng::seed_from_u64(seed);

        // Random initial topic assignments
        let mut topic_word_counts: Array2<f64> = Array2::zeros((n_topics, n_words));
        let mut doc_topic_counts: Array2<f64> = Array2::zeros((n_docs, n_topics));
        let mut topic_counts: Array1<f64> = Array1::zeros(n_topics);
        let mut assignments: Vec<Vec<usize>> = Vec::with_capacity(n_docs);

        for (doc_idx, tokens) in doc_tokens.iter().enumerate() {
            let mut doc_assignments = Vec::with_capacity(tokens.len());
            for &word_idx in tokens {
                let topic = rng.gen_range(0..n_topics);
                doc_assignments.push(topic);
                topic_word_counts[[topic, word_idx]] += 1.0;
                doc_topic_counts[[doc_idx, topic]] += 1.0;
                topic_counts[topic] += 1.0;
            }
            assignments.push(doc_assignments);
        }

        let doc_totals: Vec<f64> = doc_tokens.iter().map(|t| t.len() as f64).collect();

        let mut gamma_acc: Array2<f64> = Array2::zeros((n_docs, n_topics));
        let mut beta_acc: Array2<f64> = Array2::zeros((n_topics, n_words));
        let mut n_samples = 0usize;
        let mut history = Vec::new();
        let mut last_ll = f64::NEG_INFINITY;
        let mut converged = true;

        for iter in 0..self.config.total_iterations {
            for (doc_idx, tokens) in doc_tokens.iter().enumerate() {
                for (pos, &word_idx) in tokens.iter().enumerate() {
                    let old_topic = assignments[doc_idx][pos];

                    topic_word_counts[[old_topic, word_idx]] -= 1.0;
                    doc_topic_counts[[doc_idx, old_topic]] -= 1.0;
                    topic_counts[old_topic] -= 1.0;

                    let new_topic = sample_topic(
                        word_idx,
                        doc_idx,
                        &topic_word_counts,
                        &doc_topic_counts,
                        &topic_counts,
                        n_topics,
                        alpha,
                        beta,
                        beta_sum,
                        &mut rng,
                    );

                    topic_word_counts[[new_topic, word_idx]] += 1.0;
                    doc_topic_counts[[doc_idx, new_topic]] += 1.0;
                    topic_counts[new_topic] += 1.0;
                    assignments[doc_idx][pos] = new_topic;
                }
            }

            last_ll = compute_log_likelihood(
                &topic_word_counts,
                &doc_topic_counts,
                &topic_counts,
                alpha,
                beta,
                beta_sum,
            );

            if iter >= self.config.burn_in {
                history.push(last_ll);
                if (iter - self.config.burn_in) % self.config.thin == 0 {
                    accumulate_estimates(
                        &doc_topic_counts,
                        &topic_word_counts,
                        &topic_counts,
                        &doc_totals,
                        alpha,
                        beta,
                        beta_sum,
                        &mut gamma_acc,
                        &mut beta_acc,
                    );
                    n_samples += 1;
                }
            }

            if (iter + 1) % 50 == 0 {
                debug!("iteration {}: log-likelihood = {:.2}", iter + 1, last_ll);
            }

            if check.should_stop(iter, last_ll) {
                debug!("convergence check stopped chain at iteration {}", iter + 1);
                break;
            }

            if cancel.is_cancelled() {
                warn!(
                    "sampling cancelled at iteration {} of {}; result is best-effort",
                    iter + 1,
                    self.config.total_iterations
                );
                converged = false;
                break;
            }
        }

        // A chain stopped before any collection point still yields a valid
        // point estimate from its current state.
        if n_samples == 0 {
            accumulate_estimates(
                &doc_topic_counts,
                &topic_word_counts,
                &topic_counts,
                &doc_totals,
                alpha,
                beta,
                beta_sum,
                &mut gamma_acc,
                &mut beta_acc,
            );
            n_samples = 1;
        }

        let scale = 1.0 / n_samples as f64;
        ChainOutcome {
            gamma: gamma_acc * scale,
            beta: beta_acc * scale,
            log_likelihood: last_ll,
            history,
            converged,
        }
    }

    /// Posterior mean document-topic distribution (rows sum to 1).
    pub fn gamma(&self) -> Result<&Array2<f64>, LdaError> {
        self.gamma.as_ref().ok_or(LdaError::NotFitted)
    }

    /// Posterior mean topic-term distribution (rows sum to 1).
    pub fn beta(&self) -> Result<&Array2<f64>, LdaError> {
        self.beta.as_ref().ok_or(LdaError::NotFitted)
    }

    /// Dominant topic per document: argmax of gamma, ties to lowest index.
    pub fn dominant_topics(&self) -> Result<Vec<usize>, LdaError> {
        let gamma = self.gamma()?;
        Ok((0..gamma.nrows())
            .map(|doc_idx| argmax_row(&gamma.row(doc_idx).to_owned()))
            .collect())
    }

    /// Top `n` terms per topic with their probabilities.
    pub fn top_terms(&self, n: usize) -> Result<Vec<TopicTerms>, LdaError> {
        let beta = self.beta()?;
        let gamma = self.gamma()?;
        let terms = self.terms.as_ref().ok_or(LdaError::NotFitted)?;

        let mut topics = Vec::with_capacity(self.config.n_topics);
        for topic_id in 0..self.config.n_topics {
            let mut word_probs: Vec<(usize, f64)> = beta
                .row(topic_id)
                .iter()
                .enumerate()
                .map(|(idx, &p)| (idx, p))
                .collect();
            word_probs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            word_probs.truncate(n);

            let top_words = word_probs
                .into_iter()
                .filter_map(|(idx, p)| terms.get(idx).map(|t| (t.clone(), p)))
                .collect();

            let prevalence = gamma.column(topic_id).mean().unwrap_or(0.0);

            topics.push(TopicTerms {
                topic_id,
                top_words,
                prevalence,
            });
        }
        Ok(topics)
    }

    /// Full `(topic, term, probability)` table for external reporting.
    pub fn beta_table(&self) -> Result<Vec<BetaEntry>, LdaError> {
        let beta = self.beta()?;
        let terms = self.terms.as_ref().ok_or(LdaError::NotFitted)?;

        let mut rows = Vec::with_capacity(beta.nrows() * beta.ncols());
        for topic_id in 0..beta.nrows() {
            for (term_idx, term) in terms.iter().enumerate() {
                rows.push(BetaEntry {
                    topic_id,
                    term: term.clone(),
                    probability: beta[[topic_id, term_idx]],
                });
            }
        }
        Ok(rows)
    }

    /// Post-burn-in log-likelihood history of the selected chain.
    pub fn log_likelihood_history(&self) -> &[f64] {
        &self.log_likelihood_history
    }

    /// Index of the chain whose output was kept.
    pub fn selected_chain(&self) -> usize {
        self.selected_chain
    }

    /// False when the selected chain was cancelled before its budget.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn config(&self) -> &LdaConfig {
        &self.config
    }
}

/// Argmax with ties broken by the lowest index.
pub(crate) fn argmax_row(row: &Array1<f64>) -> usize {
    let mut best = 0;
    for (idx, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = idx;
        }
    }
    best
}

/// Draw a topic for one token from its full conditional distribution.
#[allow(clippy::too_many_arguments)]
fn sample_topic(
    word_idx: usize,
    doc_idx: usize,
    topic_word_counts: &Array2<f64>,
    doc_topic_counts: &Array2<f64>,
    topic_counts: &Array1<f64>,
    n_topics: usize,
    alpha: f64,
    beta: f64,
    beta_sum: f64,
    rng: &mut StdRng,
) -> usize {
    let doc_total = doc_topic_counts.row(doc_idx).sum() + n_topics as f64 * alpha;

    let mut probs = Vec::with_capacity(n_topics);
    let mut total = 0.0;
    for topic in 0..n_topics {
        let doc_topic = (doc_topic_counts[[doc_idx, topic]] + alpha) / doc_total;
        let topic_word =
            (topic_word_counts[[topic, word_idx]] + beta) / (topic_counts[topic] + beta_sum);
        let prob = doc_topic * topic_word;
        total += prob;
        probs.push(prob);
    }

    let threshold = rng.gen::<f64>() * total;
    let mut cumsum = 0.0;
    for (topic, &prob) in probs.iter().enumerate() {
        cumsum += prob;
        if cumsum >= threshold {
            return topic;
        }
    }
    n_topics - 1
}

/// Log-likelihood of the current assignment state.
fn compute_log_likelihood(
    topic_word_counts: &Array2<f64>,
    doc_topic_counts: &Array2<f64>,
    topic_counts: &Array1<f64>,
    alpha: f64,
    beta: f64,
    beta_sum: f64,
) -> f64 {
    let n_topics = topic_word_counts.nrows();
    let n_words = topic_word_counts.ncols();
    let mut ll = 0.0;

    for topic in 0..n_topics {
        let denom = topic_counts[topic] + beta_sum;
        for word_idx in 0..n_words {
            let count = topic_word_counts[[topic, word_idx]];
            if count > 0.0 {
                ll += count * ((count + beta) / denom).ln();
            }
        }
    }

    for doc_idx in 0..doc_topic_counts.nrows() {
        let doc_total = doc_topic_counts.row(doc_idx).sum() + n_topics as f64 * alpha;
        for topic in 0..n_topics {
            let count = doc_topic_counts[[doc_idx, topic]];
            if count > 0.0 {
                ll += count * ((count + alpha) / doc_total).ln();
            }
        }
    }

    ll
}

/// Add the current state's smoothed gamma/beta estimates to the running
/// sums. Each accumulated row sums to 1, so the averaged rows do as well.
#[allow(clippy::too_many_arguments)]
fn accumulate_estimates(
    doc_topic_counts: &Array2<f64>,
    topic_word_counts: &Array2<f64>,
    topic_counts: &Array1<f64>,
    doc_totals: &[f64],
    alpha: f64,
    beta: f64,
    beta_sum: f64,
    gamma_acc: &mut Array2<f64>,
    beta_acc: &mut Array2<f64>,
) {
    let n_topics = topic_word_counts.nrows();
    let n_words = topic_word_counts.ncols();

    for doc_idx in 0..doc_topic_counts.nrows() {
        let denom = doc_totals[doc_idx] + n_topics as f64 * alpha;
        for topic in 0..n_topics {
            gamma_acc[[doc_idx, topic]] += (doc_topic_counts[[doc_idx, topic]] + alpha) / denom;
        }
    }

    for topic in 0..n_topics {
        let denom = topic_counts[topic] + beta_sum;
        for word_idx in 0..n_words {
            beta_acc[[topic, word_idx]] += (topic_word_counts[[topic, word_idx]] + beta) / denom;
        }
    }
}
