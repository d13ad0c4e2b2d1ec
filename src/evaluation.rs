//! Holdout and cross-validation scoring, plus a KNN `k` search.

use std::fmt;
use std::ops::RangeInclusive;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, N_CLASSES, Species};
use crate::error::{ModelError, TriadResult};
use crate::model::{self, Classifier, KnnParams, ModelKind, ModelParams};

/// Seed for the shuffle that precedes fold assignment.
pub const CV_SEED: u64 = 42;

pub type ConfusionMatrix = [[usize; N_CLASSES]; N_CLASSES];

fn invalid(message: String) -> ModelError {
    ModelError::InvalidParams { message }
}

fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    indices
}

/// Shuffled holdout split returning `(train, test)`.
///
/// The test set holds `ceil(test_size * n)` samples.
pub fn train_test_split(
    data: &Dataset,
    test_size: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), ModelError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(invalid(format!(
            "test_size must be strictly between 0 and 1, got {test_size}"
        )));
    }
    let n = data.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(invalid(format!(
            "test_size {test_size} leaves no training or no test samples out of {n}"
        )));
    }
    let indices = shuffled_indices(n, seed);
    let (test, train) = indices.split_at(n_test);
    Ok((data.subset(train), data.subset(test)))
}

/// Fraction of samples classified correctly (0.0 for an empty set).
pub fn accuracy<C: Classifier + ?Sized>(model: &C, data: &Dataset) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let correct = data
        .samples
        .iter()
        .zip(&data.targets)
        .filter(|(x, y)| model.predict(x) == **y)
        .count();
    correct as f64 / data.len() as f64
}

/// Counts indexed `[true class][predicted class]`.
pub fn confusion_matrix<C: Classifier + ?Sized>(model: &C, data: &Dataset) -> ConfusionMatrix {
    let mut matrix = [[0; N_CLASSES]; N_CLASSES];
    for (x, &y) in data.samples.iter().zip(&data.targets) {
        matrix[y][model.predict(x)] += 1;
    }
    matrix
}

/// Mean accuracy over `folds` contiguous folds of a seeded shuffle.
///
/// The first `n % folds` folds get one extra sample.
pub fn cross_val_accuracy(
    kind: ModelKind,
    params: &ModelParams,
    data: &Dataset,
    folds: usize,
) -> TriadResult<f64> {
    let n = data.len();
    if folds < 2 || folds > n {
        return Err(invalid(format!("folds must be between 2 and {n}, got {folds}")).into());
    }
    let indices = shuffled_indices(n, CV_SEED);
    let base = n / folds;
    let extra = n % folds;

    let mut start = 0;
    let mut total = 0.0;
    for fold in 0..folds {
        let len = base + usize::from(fold < extra);
        let test: Vec<usize> = indices[start..start + len].to_vec();
        let train: Vec<usize> = indices[..start]
            .iter()
            .chain(&indices[start + len..])
            .copied()
            .collect();
        let fitted = model::train(kind, &data.subset(&train), params)?;
        total += accuracy(&fitted, &data.subset(&test));
        start += len;
    }
    Ok(total / folds as f64)
}

/// Outcome of a KNN `n_neighbors` search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneResult {
    pub best_k: usize,
    pub best_score: f64,
    /// `(k, mean CV accuracy)` for every k tried.
    pub scores: Vec<(usize, f64)>,
}

/// Pick the `n_neighbors` with the best CV accuracy; ties go to the smaller k.
pub fn tune_k(data: &Dataset, ks: RangeInclusive<usize>, folds: usize) -> TriadResult<TuneResult> {
    let mut scores = Vec::new();
    for k in ks {
        let params = ModelParams {
            knn: KnnParams { n_neighbors: k },
            ..Default::default()
        };
        let score = cross_val_accuracy(ModelKind::Knn, &params, data, folds)?;
        tracing::debug!(k, score, "cv score");
        scores.push((k, score));
    }

    let mut best: Option<(usize, f64)> = None;
    for &(k, score) in &scores {
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((k, score));
        }
    }
    let (best_k, best_score) =
        best.ok_or_else(|| invalid("no k values to evaluate".into()))?;
    Ok(TuneResult {
        best_k,
        best_score,
        scores,
    })
}

/// Holdout evaluation of one model kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub model: ModelKind,
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    /// Mean k-fold accuracy on the training split, when requested.
    pub cv_accuracy: Option<f64>,
}

/// Train on a holdout split and score on the rest.
pub fn evaluate(
    kind: ModelKind,
    params: &ModelParams,
    data: &Dataset,
    test_size: f64,
    seed: u64,
    folds: Option<usize>,
) -> TriadResult<EvalReport> {
    let (train, test) = train_test_split(data, test_size, seed)?;
    let fitted = model::train(kind, &train, params)?;
    let cv_accuracy = folds
        .map(|f| cross_val_accuracy(kind, params, &train, f))
        .transpose()?;
    Ok(EvalReport {
        model: kind,
        train_size: train.len(),
        test_size: test.len(),
        accuracy: accuracy(&fitted, &test),
        confusion: confusion_matrix(&fitted, &test),
        cv_accuracy,
    })
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:       {}", self.model)?;
        writeln!(f, "train/test:  {}/{}", self.train_size, self.test_size)?;
        writeln!(f, "accuracy:    {:.4}", self.accuracy)?;
        if let Some(cv) = self.cv_accuracy {
            writeln!(f, "cv accuracy: {cv:.4}")?;
        }
        writeln!(f, "confusion (rows = true class):")?;
        for (species, row) in Species::ALL.iter().zip(&self.confusion) {
            writeln!(f, "  {:<11} {:>3} {:>3} {:>3}", species.label(), row[0], row[1], row[2])?;
        }
        Ok(())
    }
}
