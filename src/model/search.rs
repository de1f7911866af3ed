//! Cross-validated hyperparameter search.
//!
//! Stratified k-fold assignment, rank-based AUC scoring, and a grid or
//! randomized search over booster configurations. Candidates are evaluated
//! in parallel but reduced deterministically by candidate index, so the
//! selected configuration is reproducible for a fixed seed.

use crate::config::{SearchConfig, SearchStrategy};
use crate::error::{PipelineError, PipelineResult};
use crate::model::booster::{BoosterConfig, GradientBoostedTrees};
use crate::types::dataset::TrainingDataset;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Validation-fold index sets for stratified k-fold cross-validation.
///
/// Each class is shuffled independently with the seed and dealt round-robin
/// across folds, so every fold preserves the global class ratio.
pub fn stratified_kfold(
    labels: &[u8],
    k: usize,
    seed: u64,
) -> PipelineResult<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(PipelineError::Configuration(format!(
            "cross-validation requires at least 2 folds, got {}",
            k
        )));
    }
    if labels.len() < k {
        return Err(PipelineError::Configuration(format!(
            "cannot build {} folds from {} samples",
            k,
            labels.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    for class in [0u8, 1u8] {
        let mut indices: Vec<usize> = (0..labels.len())
            .filter(|&i| labels[i] == class)
            .collect();
        indices.shuffle(&mut rng);
        for (position, index) in indices.into_iter().enumerate() {
            folds[position % k].push(index);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney) statistic with
/// average ranks for tied scores. `None` when either class is absent.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let n = labels.len();
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks over tied groups, then sum positive ranks.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j + 2) as f64 / 2.0; // ranks are 1-based
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += average_rank;
            }
        }
        i = j + 1;
    }

    let auc = (rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0)
        / (n_pos as f64 * n_neg as f64);
    Some(auc)
}

/// Result of evaluating one candidate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub config: BoosterConfig,
    pub mean_auc: f64,
    pub fold_aucs: Vec<f64>,
}

/// Outcome of a hyperparameter search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Winning configuration (highest mean AUC, first-seen wins ties)
    pub best: CandidateResult,
    /// Index of the winner within the candidate list
    pub best_index: usize,
    /// All successfully evaluated candidates, in candidate order
    pub evaluated: Vec<CandidateResult>,
}

/// Cross-validated search over booster configurations.
pub struct ModelSearch {
    config: SearchConfig,
}

impl ModelSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Expand the configured value lists into candidate configurations.
    ///
    /// Grid strategy takes the full cartesian product; random strategy
    /// draws `budget` combinations with the search seed.
    pub fn candidates(&self) -> Vec<BoosterConfig> {
        let base = BoosterConfig {
            balance_classes: true,
            seed: self.config.seed,
            ..BoosterConfig::default()
        };

        match self.config.strategy {
            SearchStrategy::Grid => {
                let mut out = Vec::new();
                for &n_trees in &self.config.n_trees {
                    for &learning_rate in &self.config.learning_rate {
                        for &max_depth in &self.config.max_depth {
                            for &subsample in &self.config.subsample {
                                out.push(BoosterConfig {
                                    n_trees,
                                    learning_rate,
                                    max_depth,
                                    subsample,
                                    ..base.clone()
                                });
                            }
                        }
                    }
                }
                out
            }
            SearchStrategy::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
                (0..self.config.budget)
                    .map(|_| BoosterConfig {
                        n_trees: self.config.n_trees
                            [rng.gen_range(0..self.config.n_trees.len())],
                        learning_rate: self.config.learning_rate
                            [rng.gen_range(0..self.config.learning_rate.len())],
                        max_depth: self.config.max_depth
                            [rng.gen_range(0..self.config.max_depth.len())],
                        subsample: self.config.subsample
                            [rng.gen_range(0..self.config.subsample.len())],
                        ..base.clone()
                    })
                    .collect()
            }
        }
    }

    /// Run the search over a training dataset.
    ///
    /// Fold assignment is computed once and shared by all candidates.
    /// Candidates run in parallel; the winner is chosen by a sequential
    /// reduction over candidate index with a strictly-higher comparison, so
    /// the first-seen candidate wins ties — an explicit tie-break, not a
    /// loop-order accident.
    pub fn run(&self, dataset: &TrainingDataset) -> PipelineResult<SearchOutcome> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(PipelineError::Configuration(
                "hyperparameter search has no candidates".to_string(),
            ));
        }

        let folds = stratified_kfold(&dataset.labels, self.config.folds, self.config.seed)?;
        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            strategy = ?self.config.strategy,
            "Starting hyperparameter search"
        );

        let scored: Vec<(usize, PipelineResult<CandidateResult>)> = candidates
            .par_iter()
            .enumerate()
            .map(|(index, candidate)| {
                (index, evaluate_candidate(candidate, dataset, &folds))
            })
            .collect();

        let mut evaluated = Vec::new();
        let mut best: Option<(usize, CandidateResult)> = None;
        let mut scored = scored;
        scored.sort_by_key(|(index, _)| *index);

        for (index, result) in scored {
            match result {
                Ok(candidate) => {
                    debug!(
                        candidate = index,
                        mean_auc = candidate.mean_auc,
                        "Candidate evaluated"
                    );
                    let is_better = match &best {
                        None => true,
                        Some((_, current)) => candidate.mean_auc > current.mean_auc,
                    };
                    if is_better {
                        best = Some((index, candidate.clone()));
                    }
                    evaluated.push(candidate);
                }
                Err(e) => {
                    warn!(candidate = index, error = %e, "Candidate failed, skipping");
                }
            }
        }

        let (best_index, best) = best.ok_or_else(|| {
            PipelineError::Training(
                "all hyperparameter candidates failed to fit".to_string(),
            )
        })?;

        info!(
            best_index = best_index,
            mean_auc = best.mean_auc,
            n_trees = best.config.n_trees,
            learning_rate = best.config.learning_rate,
            max_depth = best.config.max_depth,
            "Hyperparameter search complete"
        );

        Ok(SearchOutcome {
            best,
            best_index,
            evaluated,
        })
    }
}

fn evaluate_candidate(
    candidate: &BoosterConfig,
    dataset: &TrainingDataset,
    folds: &[Vec<usize>],
) -> PipelineResult<CandidateResult> {
    let mut fold_aucs = Vec::with_capacity(folds.len());
    for fold in folds {
        let train_indices: Vec<usize> = {
            let held_out: std::collections::HashSet<usize> = fold.iter().copied().collect();
            (0..dataset.len()).filter(|i| !held_out.contains(i)).collect()
        };

        let train_rows: Vec<Vec<f64>> = train_indices
            .iter()
            .map(|&i| dataset.features.rows[i].clone())
            .collect();
        let train_labels: Vec<u8> = train_indices.iter().map(|&i| dataset.labels[i]).collect();

        let model = GradientBoostedTrees::fit(candidate, &train_rows, &train_labels)?;

        let valid_rows: Vec<Vec<f64>> = fold
            .iter()
            .map(|&i| dataset.features.rows[i].clone())
            .collect();
        let valid_labels: Vec<u8> = fold.iter().map(|&i| dataset.labels[i]).collect();
        let scores = model.predict_proba(&valid_rows);

        let auc = roc_auc(&valid_labels, &scores).ok_or_else(|| {
            PipelineError::Training(
                "validation fold contains a single class; AUC undefined".to_string(),
            )
        })?;
        fold_aucs.push(auc);
    }

    // Deterministic aggregation: plain mean in fold order.
    let mean_auc = fold_aucs.iter().sum::<f64>() / fold_aucs.len() as f64;
    Ok(CandidateResult {
        config: candidate.clone(),
        mean_auc,
        fold_aucs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::dataset::FeatureMatrix;

    fn imbalanced_labels(n_pos: usize, n_neg: usize) -> Vec<u8> {
        let mut labels = vec![1u8; n_pos];
        labels.extend(vec![0u8; n_neg]);
        labels
    }

    #[test]
    fn test_stratified_folds_preserve_class_ratio() {
        let labels = imbalanced_labels(100, 900);
        let folds = stratified_kfold(&labels, 5, 42).unwrap();

        assert_eq!(folds.iter().map(|f| f.len()).sum::<usize>(), 1000);
        let global = 0.1;
        for fold in &folds {
            let pos = fold.iter().filter(|&&i| labels[i] == 1).count();
            let frac = pos as f64 / fold.len() as f64;
            assert!(
                (frac - global).abs() < 0.02,
                "fold positive fraction {} too far from {}",
                frac,
                global
            );
        }
    }

    #[test]
    fn test_folds_are_disjoint_and_complete() {
        let labels = imbalanced_labels(20, 80);
        let folds = stratified_kfold(&labels, 4, 1).unwrap();
        let mut seen = vec![false; 100];
        for fold in &folds {
            for &i in fold {
                assert!(!seen[i], "index {} appears in two folds", i);
                seen[i] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn test_kfold_rejects_bad_fold_count() {
        let labels = imbalanced_labels(5, 5);
        assert!(stratified_kfold(&labels, 1, 0).is_err());
        assert!(stratified_kfold(&labels, 11, 0).is_err());
    }

    #[test]
    fn test_auc_perfect_ranking() {
        let labels = vec![0, 0, 1, 1];
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc(&labels, &scores).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_reversed_ranking() {
        let labels = vec![1, 1, 0, 0];
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        assert!(roc_auc(&labels, &scores).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_auc_constant_scores_is_half() {
        let labels = vec![0, 1, 0, 1, 0];
        let scores = vec![0.5; 5];
        assert!((roc_auc(&labels, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_undefined_for_single_class() {
        assert!(roc_auc(&[1, 1], &[0.2, 0.3]).is_none());
    }

    fn search_dataset() -> TrainingDataset {
        // Separable along the first feature, with minority positives.
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..160 {
            rows.push(vec![(i % 13) as f64 * 0.1, (i % 5) as f64]);
            labels.push(0u8);
        }
        for i in 0..40 {
            rows.push(vec![5.0 + (i % 7) as f64 * 0.1, (i % 5) as f64]);
            labels.push(1u8);
        }
        let features =
            FeatureMatrix::new(vec!["x".to_string(), "y".to_string()], rows).unwrap();
        TrainingDataset::new(features, labels).unwrap()
    }

    fn tiny_search_config() -> SearchConfig {
        SearchConfig {
            folds: 3,
            strategy: SearchStrategy::Grid,
            budget: 4,
            seed: 42,
            n_trees: vec![10],
            learning_rate: vec![0.3],
            max_depth: vec![2, 3],
            subsample: vec![1.0],
        }
    }

    #[test]
    fn test_grid_candidates_cartesian_product() {
        let mut config = tiny_search_config();
        config.n_trees = vec![10, 20];
        config.learning_rate = vec![0.1, 0.3];
        let search = ModelSearch::new(config);
        assert_eq!(search.candidates().len(), 8);
    }

    #[test]
    fn test_random_candidates_respect_budget_and_seed() {
        let mut config = tiny_search_config();
        config.strategy = SearchStrategy::Random;
        config.n_trees = vec![10, 20, 30];
        config.budget = 5;
        let a = ModelSearch::new(config.clone()).candidates();
        let b = ModelSearch::new(config).candidates();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_selects_a_candidate() {
        let dataset = search_dataset();
        let outcome = ModelSearch::new(tiny_search_config()).run(&dataset).unwrap();
        assert!(outcome.best.mean_auc > 0.9);
        assert_eq!(outcome.evaluated.len(), 2);
    }

    #[test]
    fn test_tie_break_prefers_first_candidate() {
        // Duplicate candidates produce identical mean AUCs.
        let mut config = tiny_search_config();
        config.max_depth = vec![3, 3];
        let dataset = search_dataset();
        let outcome = ModelSearch::new(config).run(&dataset).unwrap();
        assert_eq!(outcome.best_index, 0);
    }

    #[test]
    fn test_all_candidates_failing_is_a_training_error() {
        // Single-class data: every booster fit fails.
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels = vec![0u8; 30];
        let features = FeatureMatrix::new(vec!["x".to_string()], rows).unwrap();
        let dataset = TrainingDataset::new(features, labels).unwrap();

        let err = ModelSearch::new(tiny_search_config())
            .run(&dataset)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_search_is_reproducible() {
        let dataset = search_dataset();
        let a = ModelSearch::new(tiny_search_config()).run(&dataset).unwrap();
        let b = ModelSearch::new(tiny_search_config()).run(&dataset).unwrap();
        assert_eq!(a.best_index, b.best_index);
        assert_eq!(a.best.mean_auc, b.best.mean_auc);
    }
}
