//! Isolation forest (Liu, Ting & Zhou, 2008).
//!
//! Each tree recursively partitions a random subsample with axis-aligned
//! splits drawn uniformly between a feature's min and max. Outliers end up
//! isolated near the root, so a short average path length across the forest
//! means a high anomaly score.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect::DetectError;
use crate::reading::{FEATURE_COUNT, FEATURE_NAMES};

/// Euler–Mascheroni constant, used in the harmonic number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// One row of the feature matrix.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Fit and thresholding parameters for the anomaly scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Expected fraction of outliers, in (0, 0.5).
    pub contamination: f64,
    pub seed: u64,
    pub n_trees: usize,
    /// Upper bound on the per-tree subsample size.
    pub max_samples: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            contamination: 0.10,
            seed: 42,
            n_trees: 100,
            max_samples: 256,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(self.contamination > 0.0 && self.contamination < 0.5) {
            return Err(DetectError::invalid(format!(
                "contamination must be in (0, 0.5), got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 {
            return Err(DetectError::invalid("n_trees must be at least 1"));
        }
        if self.max_samples < 2 {
            return Err(DetectError::invalid(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single isolation tree stored as a flat arena; node 0 is the root.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &[FeatureRow], sample: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(2 * sample.len()),
        };
        tree.grow_node(data, sample, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        data: &[FeatureRow],
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it.
        let mut spans: Vec<(usize, f64, f64)> = Vec::with_capacity(FEATURE_COUNT);
        for feature in 0..FEATURE_COUNT {
            let (lo, hi) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(data[i][feature]), hi.max(data[i][feature])),
            );
            if hi > lo {
                spans.push((feature, lo, hi));
            }
        }
        if spans.is_empty() {
            return id;
        }

        let (feature, lo, hi) = spans[rng.gen_range(0..spans.len())];
        let threshold = draw_threshold(lo, hi, rng);

        // threshold is in [lo, hi), so both sides end up non-empty.
        let mut split = 0;
        for k in 0..indices.len() {
            if data[indices[k]][feature] <= threshold {
                indices.swap(k, split);
                split += 1;
            }
        }

        let (left_idx, right_idx) = indices.split_at_mut(split);
        let left = self.grow_node(data, left_idx, depth + 1, max_depth, rng);
        let right = self.grow_node(data, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &FeatureRow) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Uniform split value in `[lo, hi)`. Spans wider than `f64::MAX` are drawn
/// in two halves so the arithmetic stays finite.
fn draw_threshold(lo: f64, hi: f64, rng: &mut StdRng) -> f64 {
    if (hi - lo).is_finite() {
        return rng.gen_range(lo..hi);
    }
    let half = hi / 2.0 - lo / 2.0;
    let u: f64 = rng.gen();
    let t = (lo + u * half) + u * half;
    if t >= lo && t < hi {
        t
    } else {
        lo
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
/// Used both to normalise scores and to credit leaves holding several points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted ensemble. Cheap to score, rebuilt from scratch on every fit.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample: usize,
}

impl IsolationForest {
    /// Fit a forest over `data`. Needs at least two rows that are not all
    /// identical.
    pub fn fit(data: &[FeatureRow], params: &ForestParams) -> Result<Self, DetectError> {
        params.validate()?;
        validate_rows(data)?;
        if data.len() < 2 {
            return Err(DetectError::ModelFit {
                reason: format!("need at least 2 readings, have {}", data.len()),
            });
        }
        if !has_variance(data) {
            return Err(DetectError::ModelFit {
                reason: format!("all {} feature vectors are identical", data.len()),
            });
        }

        let subsample = params.max_samples.min(data.len());
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees)
            .map(|_| {
                let mut sample = index::sample(&mut rng, data.len(), subsample).into_vec();
                IsolationTree::grow(data, &mut sample, max_depth, &mut rng)
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            subsample,
            max_depth,
            rows = data.len(),
            "isolation forest fitted"
        );
        Ok(Self { trees, subsample })
    }

    /// Anomaly score in (0, 1]. Around 0.5 or below is ordinary; close to 1
    /// is strongly anomalous.
    pub fn score(&self, row: &FeatureRow) -> f64 {
        let norm = average_path_length(self.subsample);
        if norm <= 0.0 {
            return 0.5;
        }
        let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
        let mean = total / self.trees.len() as f64;
        2f64.powf(-mean / norm)
    }

    pub fn score_all(&self, data: &[FeatureRow]) -> Vec<f64> {
        data.iter().map(|row| self.score(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample(&self) -> usize {
        self.subsample
    }
}

/// Reject empty input and non-finite feature values.
pub fn validate_rows(data: &[FeatureRow]) -> Result<(), DetectError> {
    if data.is_empty() {
        return Err(DetectError::invalid("no readings to score"));
    }
    for (index, row) in data.iter().enumerate() {
        if let Some(f) = row.iter().position(|v| !v.is_finite()) {
            return Err(DetectError::invalid(format!(
                "reading {} has non-finite {} ({})",
                index, FEATURE_NAMES[f], row[f]
            )));
        }
    }
    Ok(())
}

fn has_variance(data: &[FeatureRow]) -> bool {
    let first = &data[0];
    data.iter().skip(1).any(|row| row != first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(n: usize, seed: u64) -> Vec<FeatureRow> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let mut row = [0.0; FEATURE_COUNT];
                for v in row.iter_mut() {
                    *v = rng.gen_range(-1.0..1.0);
                }
                row
            })
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ~= 10.24 (Liu, Ting, Zhou 2008)
        let c = average_path_length(256);
        assert!((c - 10.24).abs() < 0.01, "c(256) = {}", c);
    }

    #[test]
    fn test_outlier_scores_highest() {
        let mut data = cloud(300, 7);
        data.push([10.0; FEATURE_COUNT]);

        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.score_all(&data);

        let outlier = scores[300];
        let max_inlier = scores[..300].iter().cloned().fold(f64::MIN, f64::max);
        assert!(outlier > max_inlier, "outlier {} vs inlier {}", outlier, max_inlier);
        assert!(outlier > 0.7);
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = cloud(120, 1);
        let params = ForestParams::default();
        let a = IsolationForest::fit(&data, &params).unwrap().score_all(&data);
        let b = IsolationForest::fit(&data, &params).unwrap().score_all(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn test_subsample_capped_by_rows() {
        let data = cloud(40, 3);
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        assert_eq!(forest.subsample(), 40);
        assert_eq!(forest.n_trees(), 100);
    }

    #[test]
    fn test_identical_rows_fail_to_fit() {
        let data = vec![[1.0, 2.0, 3.0, 25.0, 60.0, 2.0]; 50];
        let err = IsolationForest::fit(&data, &ForestParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::ModelFit { .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut data = cloud(10, 2);
        data[4][3] = f64::NAN;
        let err = IsolationForest::fit(&data, &ForestParams::default()).unwrap_err();
        match err {
            DetectError::InvalidInput { reason } => {
                assert!(reason.contains("reading 4"));
                assert!(reason.contains("temp"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_params_validation() {
        let mut p = ForestParams::default();
        assert!(p.validate().is_ok());
        p.contamination = 0.5;
        assert!(p.validate().is_err());
        p.contamination = 0.0;
        assert!(p.validate().is_err());
        p = ForestParams {
            n_trees: 0,
            ..ForestParams::default()
        };
        assert!(p.validate().is_err());
        p = ForestParams {
            max_samples: 1,
            ..ForestParams::default()
        };
        assert!(p.validate().is_err());
        p.max_samples = 2;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_tiny_subsample_scores_are_finite() {
        let data = cloud(20, 4);
        let params = ForestParams {
            max_samples: 2,
            ..ForestParams::default()
        };
        let scores = IsolationForest::fit(&data, &params).unwrap().score_all(&data);
        assert!(scores.iter().all(|s| s.is_finite() && *s > 0.0 && *s <= 1.0));
    }

    #[test]
    fn test_span_wider_than_f64_max_splits() {
        let mut data = cloud(10, 5);
        data[0][3] = -1e308;
        data[1][3] = 1e308;
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.score_all(&data);
        assert!(scores.iter().all(|s| s.is_finite() && *s > 0.0 && *s <= 1.0));
    }

    #[test]
    fn test_draw_threshold_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let t = draw_threshold(-f64::MAX, f64::MAX, &mut rng);
            assert!(t.is_finite());
            assert!(t >= -f64::MAX && t < f64::MAX);
        }
        let t = draw_threshold(0.0, 1.0, &mut rng);
        assert!((0.0..1.0).contains(&t));
    }
}
