//! k-nearest-neighbours classifier with uniform weights.

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, N_CLASSES, N_FEATURES};
use crate::error::ModelError;

use super::Classifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnParams {
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
}

fn default_n_neighbors() -> usize {
    5
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: default_n_neighbors(),
        }
    }
}

/// Stores the training set and votes among the `k` closest samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    n_neighbors: usize,
    samples: Vec<[f64; N_FEATURES]>,
    targets: Vec<usize>,
}

impl KnnClassifier {
    pub fn fit(data: &Dataset, params: &KnnParams) -> Result<Self, ModelError> {
        super::check_training_set(data)?;
        if params.n_neighbors == 0 || params.n_neighbors > data.len() {
            return Err(ModelError::InvalidParams {
                message: format!(
                    "n_neighbors must be between 1 and {} (the number of samples), got {}",
                    data.len(),
                    params.n_neighbors
                ),
            });
        }
        Ok(Self {
            n_neighbors: params.n_neighbors,
            samples: data.samples.clone(),
            targets: data.targets.clone(),
        })
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Indices of the `k` nearest training samples, closest first.
    /// Equal distances keep training order.
    pub fn neighbors(&self, x: &[f64; N_FEATURES]) -> Vec<usize> {
        let mut dists: Vec<(f64, usize)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (squared_distance(s, x), i))
            .collect();
        // Stable sort: ties stay in index order.
        dists.sort_by(|a, b| a.0.total_cmp(&b.0));
        dists
            .into_iter()
            .take(self.n_neighbors)
            .map(|(_, i)| i)
            .collect()
    }
}

fn squared_distance(a: &[f64; N_FEATURES], b: &[f64; N_FEATURES]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Classifier for KnnClassifier {
    fn n_classes(&self) -> usize {
        N_CLASSES
    }

    fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64> {
        let mut votes = vec![0.0; N_CLASSES];
        let neighbors = self.neighbors(x);
        for &i in &neighbors {
            votes[self.targets[i]] += 1.0;
        }
        let k = neighbors.len() as f64;
        votes.iter_mut().for_each(|v| *v /= k);
        votes
    }
}
