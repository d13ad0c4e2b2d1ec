//! Random forest of Gini-split decision trees.
//!
//! Each tree is grown on a bootstrap sample and considers a random subset of
//! `max_features` features at every split. Tree `i` draws from an RNG seeded
//! with `seed + i`, so the fitted forest does not depend on how rayon
//! schedules the trees.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, N_CLASSES, N_FEATURES};
use crate::error::ModelError;

use super::Classifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// `None` grows trees until leaves are pure.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Features considered per split; `None` means `floor(sqrt(n_features))`.
    #[serde(default)]
    pub max_features: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
}

fn default_n_estimators() -> usize {
    100
}
fn default_seed() -> u64 {
    42
}
fn default_min_samples_split() -> usize {
    2
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            max_depth: None,
            max_features: None,
            min_samples_split: default_min_samples_split(),
        }
    }
}

impl ForestParams {
    fn resolved_max_features(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (N_FEATURES as f64).sqrt().floor() as usize)
    }

    fn check(&self) -> Result<(), ModelError> {
        let invalid = |message: String| Err(ModelError::InvalidParams { message });
        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1".into());
        }
        let mf = self.resolved_max_features();
        if mf == 0 || mf > N_FEATURES {
            return invalid(format!(
                "max_features must be between 1 and {N_FEATURES}, got {mf}"
            ));
        }
        if self.min_samples_split < 2 {
            return invalid("min_samples_split must be at least 2".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: [f64; N_CLASSES],
    },
}

/// A single fitted tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, x: &[f64; N_FEATURES]) -> &[f64; N_CLASSES] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf (a lone root leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

fn class_counts(data: &Dataset, indices: &[usize]) -> [f64; N_CLASSES] {
    let mut counts = [0.0; N_CLASSES];
    for &i in indices {
        counts[data.targets[i]] += 1.0;
    }
    counts
}

fn gini(counts: &[f64; N_CLASSES], total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    data: &'a Dataset,
    params: &'a ForestParams,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn leaf(&mut self, counts: &[f64; N_CLASSES], total: f64) -> usize {
        let mut distribution = [0.0; N_CLASSES];
        for (d, c) in distribution.iter_mut().zip(counts) {
            *d = c / total;
        }
        self.push(Node::Leaf { distribution })
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = class_counts(self.data, &indices);
        let total = indices.len() as f64;
        let pure = counts.iter().filter(|&&c| c > 0.0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);

        if pure || depth_reached || indices.len() < self.params.min_samples_split {
            return self.leaf(&counts, total);
        }

        let Some(best) = self.find_split(&indices, &counts) else {
            // All candidate features are constant over this node.
            return self.leaf(&counts, total);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.data.samples[i][best.feature] <= best.threshold);

        // Reserve the split slot so children get later ids.
        let id = self.push(Node::Leaf {
            distribution: [0.0; N_CLASSES],
        });
        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Examine features in random order, at least `max_features` of them and
    /// more only while no valid split has been found.
    fn find_split(&mut self, indices: &[usize], parent: &[f64; N_CLASSES]) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..N_FEATURES).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        for (examined, &feature) in features.iter().enumerate() {
            if examined >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_threshold(indices, parent, feature) {
                if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_threshold(
        &self,
        indices: &[usize],
        parent: &[f64; N_CLASSES],
        feature: usize,
    ) -> Option<BestSplit> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.data.samples[i][feature], self.data.targets[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len() as f64;
        let mut left = [0.0; N_CLASSES];
        let mut best: Option<BestSplit> = None;

        for pos in 1..sorted.len() {
            left[sorted[pos - 1].1] += 1.0;
            let (prev, next) = (sorted[pos - 1].0, sorted[pos].0);
            if prev == next {
                continue;
            }
            let mut right = [0.0; N_CLASSES];
            for c in 0..N_CLASSES {
                right[c] = parent[c] - left[c];
            }
            let nl = pos as f64;
            let nr = n - nl;
            let impurity = (nl * gini(&left, nl) + nr * gini(&right, nr)) / n;
            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                let mut threshold = prev + (next - prev) / 2.0;
                // Rounding can push the midpoint onto the upper value.
                if threshold >= next {
                    threshold = prev;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

/// Bagged ensemble of decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, params: &ForestParams) -> Result<Self, ModelError> {
        super::check_training_set(data)?;
        params.check()?;
        let max_features = params.resolved_max_features();
        let n = data.len();

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    data,
                    params,
                    max_features,
                    rng,
                    nodes: Vec::new(),
                };
                builder.build(bootstrap, 0);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }

    pub fn total_leaves(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_leaves).sum()
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        N_CLASSES
    }

    fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64> {
        let mut proba = vec![0.0; N_CLASSES];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.leaf_distribution(x)) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}
