//! Isolation-forest scoring of whole trajectories.
//!
//! Each trajectory is reduced to `(avg speed, distance, duration, point
//! count)`. Points that random axis-aligned splits isolate quickly get a
//! score close to 1; typical points stay around 0.5 or below.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::anomalies::{Anomaly, AnomalyKind, OutlierDetector, Severity};
use crate::config::AnomalyConfig;
use crate::trajectory::Trajectory;

const FEATURES: usize = 4;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

pub type Features = [f64; FEATURES];

pub fn features(trajectory: &Trajectory) -> Features {
    [
        trajectory.avg_speed,
        trajectory.total_distance,
        trajectory.total_duration,
        trajectory.len() as f64,
    ]
}

/// Average path length of an unsuccessful search in a binary tree of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(rows: Vec<Features>, depth: usize, height_limit: usize, rng: &mut ChaCha8Rng) -> Node {
        if depth >= height_limit || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        // Only features that still vary can split this node.
        let spreads: Vec<(usize, f64, f64)> = (0..FEATURES)
            .filter_map(|f| {
                let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                    (lo.min(r[f]), hi.max(r[f]))
                });
                (min < max).then_some((f, min, max))
            })
            .collect();

        if spreads.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, min, max) = spreads[rng.random_range(0..spreads.len())];
        let threshold = rng.random_range(min..max);
        let (left, right): (Vec<Features>, Vec<Features>) =
            rows.into_iter().partition(|r| r[feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::build(left, depth + 1, height_limit, rng)),
            right: Box::new(Node::build(right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, x: &Features, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] < *threshold {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fits `n_trees` trees, each on a random subsample of `data`.
    pub fn fit(data: &[Features], n_trees: usize, sample_size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let sample_size = sample_size.min(data.len());
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let rows = index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| data[i])
                    .collect();
                Node::build(rows, 0, height_limit, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in (0, 1]; 0.5 when the forest cannot tell.
    pub fn score(&self, x: &Features) -> f64 {
        let c = average_path_length(self.sample_size);
        if self.trees.is_empty() || c == 0.0 {
            return 0.5;
        }
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x, 0)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / c)
    }

    pub fn score_all(&self, data: &[Features]) -> Vec<f64> {
        data.iter().map(|x| self.score(x)).collect()
    }
}

/// Flags trajectories the isolation forest scores above the threshold.
///
/// Scores are relative to the population passed in: the same trajectory
/// can score differently once the rest of the set changes.
#[derive(Debug, Clone)]
pub struct StatisticalDetector {
    min_trajectories: usize,
    threshold: f64,
    trees: usize,
    sample_size: usize,
    seed: u64,
}

impl StatisticalDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            min_trajectories: config.statistical_min_trajectories,
            threshold: config.statistical_threshold,
            trees: config.forest_trees,
            sample_size: config.forest_sample_size,
            seed: config.forest_seed,
        }
    }

    /// One score per trajectory, in input order. Empty below the minimum
    /// population size.
    pub fn scores(&self, trajectories: &[&Trajectory]) -> Vec<f64> {
        if trajectories.len() < self.min_trajectories {
            debug!(
                trajectories = trajectories.len(),
                required = self.min_trajectories,
                "Too few trajectories for statistical pass"
            );
            return Vec::new();
        }

        let data: Vec<Features> = trajectories.iter().map(|t| features(t)).collect();
        IsolationForest::fit(&data, self.trees, self.sample_size, self.seed).score_all(&data)
    }

    /// Copies of `trajectories` with `anomaly_score` set by this pass.
    pub fn score_trajectories(&self, trajectories: &[&Trajectory]) -> Vec<Trajectory> {
        let scores = self.scores(trajectories);
        trajectories
            .iter()
            .enumerate()
            .map(|(i, t)| Trajectory {
                anomaly_score: scores.get(i).copied(),
                ..(*t).clone()
            })
            .collect()
    }
}

impl OutlierDetector for StatisticalDetector {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn detect(&self, trajectories: &[&Trajectory]) -> Vec<Anomaly> {
        let scores = self.scores(trajectories);
        trajectories
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > self.threshold)
            .filter_map(|(t, score)| Anomaly::at_start(t, AnomalyKind::Statistical, Severity::High, score))
            .collect()
    }
}
