//! Iris classifiers: k-nearest neighbours and a random forest.
//!
//! Both implement [`Classifier`]. A fitted classifier is wrapped in a
//! [`TrainedModel`] together with the parameters and target names it was
//! trained with; that envelope is what the artifact store persists.

pub mod forest;
pub mod knn;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::{self, Dataset, N_CLASSES, N_FEATURES};
use crate::error::ModelError;

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use knn::{KnnClassifier, KnnParams};

/// Common inference interface.
pub trait Classifier {
    /// Number of classes the probability vector covers.
    fn n_classes(&self) -> usize;

    /// Class membership probabilities, indexed by class.
    fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64>;

    /// Most probable class index.
    fn predict(&self, x: &[f64; N_FEATURES]) -> usize {
        argmax(&self.predict_proba(x))
    }
}

/// Index of the first maximal value (0 for an empty slice).
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Reject training sets a classifier cannot index into: empty, ragged, or
/// with targets outside `0..N_CLASSES`.
pub(crate) fn check_training_set(data: &Dataset) -> Result<(), ModelError> {
    if data.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if data.samples.len() != data.targets.len() {
        return Err(ModelError::InvalidParams {
            message: format!(
                "{} samples but {} targets",
                data.samples.len(),
                data.targets.len()
            ),
        });
    }
    if let Some((row, &target)) = data
        .targets
        .iter()
        .enumerate()
        .find(|(_, t)| **t >= N_CLASSES)
    {
        return Err(ModelError::InvalidParams {
            message: format!("target {target} at row {row} is not below {N_CLASSES}"),
        });
    }
    Ok(())
}

/// A concrete model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Knn,
    Forest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Knn, ModelKind::Forest];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Knn => "knn",
            ModelKind::Forest => "forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(ModelKind::Knn),
            "forest" => Ok(ModelKind::Forest),
            _ => Err(ModelError::UnknownKind { name: s.to_string() }),
        }
    }
}

/// A model kind as requested by a caller; `auto` picks the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelChoice {
    #[default]
    Auto,
    Kind(ModelKind),
}

impl ModelChoice {
    pub fn resolve(self) -> ModelKind {
        match self {
            ModelChoice::Auto => ModelKind::Forest,
            ModelChoice::Kind(kind) => kind,
        }
    }

    /// Names accepted by [`FromStr`], in display order.
    pub fn names() -> Vec<&'static str> {
        vec!["auto", "knn", "forest"]
    }
}

impl FromStr for ModelChoice {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(ModelChoice::Auto)
        } else {
            s.parse().map(ModelChoice::Kind)
        }
    }
}

impl From<ModelKind> for ModelChoice {
    fn from(kind: ModelKind) -> Self {
        ModelChoice::Kind(kind)
    }
}

/// Hyperparameters for both model families.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub knn: KnnParams,
    pub forest: ForestParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Estimator {
    Knn(KnnClassifier),
    Forest(RandomForest),
}

/// A fitted classifier plus the metadata needed to serve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub kind: ModelKind,
    pub params: ModelParams,
    pub target_names: Vec<String>,
    pub n_samples: usize,
    pub trained_at: DateTime<Utc>,
    estimator: Estimator,
}

impl TrainedModel {
    /// Label for a class index, falling back to the index itself.
    pub fn label(&self, index: usize) -> String {
        self.target_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    /// Short human-readable description of the fitted estimator.
    pub fn summary(&self) -> String {
        match &self.estimator {
            Estimator::Knn(knn) => format!(
                "knn: k={}, {} reference samples",
                knn.n_neighbors(),
                knn.n_samples()
            ),
            Estimator::Forest(forest) => format!(
                "forest: {} trees, max depth {}, {} leaves",
                forest.n_trees(),
                forest.max_tree_depth(),
                forest.total_leaves()
            ),
        }
    }
}

impl Classifier for TrainedModel {
    fn n_classes(&self) -> usize {
        match &self.estimator {
            Estimator::Knn(m) => m.n_classes(),
            Estimator::Forest(m) => m.n_classes(),
        }
    }

    fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64> {
        match &self.estimator {
            Estimator::Knn(m) => m.predict_proba(x),
            Estimator::Forest(m) => m.predict_proba(x),
        }
    }
}

/// Fit a model of the given kind.
pub fn train(
    kind: ModelKind,
    data: &Dataset,
    params: &ModelParams,
) -> Result<TrainedModel, ModelError> {
    let started = std::time::Instant::now();
    let estimator = match kind {
        ModelKind::Knn => Estimator::Knn(KnnClassifier::fit(data, &params.knn)?),
        ModelKind::Forest => Estimator::Forest(RandomForest::fit(data, &params.forest)?),
    };
    tracing::debug!(
        kind = %kind,
        samples = data.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "model trained"
    );
    Ok(TrainedModel {
        kind,
        params: params.clone(),
        target_names: dataset::target_names(),
        n_samples: data.len(),
        trained_at: Utc::now(),
        estimator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_targets_are_rejected_for_both_kinds() {
        let data = Dataset {
            samples: vec![[0.0; 4], [1.0; 4]],
            targets: vec![0, 3],
        };
        for kind in ModelKind::ALL {
            let err = train(kind, &data, &ModelParams::default()).unwrap_err();
            assert!(
                matches!(err, ModelError::InvalidParams { ref message } if message.contains("row 1")),
                "{kind}: {err}"
            );
        }
    }

    #[test]
    fn ragged_dataset_is_rejected_for_both_kinds() {
        let data = Dataset {
            samples: vec![[0.0; 4], [1.0; 4], [2.0; 4]],
            targets: vec![0, 1],
        };
        for kind in ModelKind::ALL {
            assert!(matches!(
                train(kind, &data, &ModelParams::default()),
                Err(ModelError::InvalidParams { .. })
            ));
        }
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[1.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("KNN".parse::<ModelKind>().unwrap(), ModelKind::Knn);
        assert_eq!(" forest ".parse::<ModelKind>().unwrap(), ModelKind::Forest);
        assert!(matches!(
            "svm".parse::<ModelKind>(),
            Err(ModelError::UnknownKind { .. })
        ));
    }

    #[test]
    fn auto_resolves_to_forest() {
        assert_eq!("auto".parse::<ModelChoice>().unwrap().resolve(), ModelKind::Forest);
        assert_eq!(ModelChoice::default().resolve(), ModelKind::Forest);
        assert_eq!(
            "knn".parse::<ModelChoice>().unwrap(),
            ModelChoice::Kind(ModelKind::Knn)
        );
    }

    #[test]
    fn trained_models_label_known_species() {
        let iris = Dataset::iris().unwrap();
        let model = train(ModelKind::Knn, &iris, &ModelParams::default()).unwrap();
        assert_eq!(model.kind, ModelKind::Knn);
        assert_eq!(model.n_samples, 150);
        assert_eq!(model.n_classes(), 3);
        assert_eq!(model.label(0), "setosa");
        assert_eq!(model.label(7), "7");
        assert!(model.summary().starts_with("knn: k=5"));
    }

    #[test]
    fn empty_dataset_cannot_be_trained() {
        let empty = Dataset {
            samples: Vec::new(),
            targets: Vec::new(),
        };
        assert!(matches!(
            train(ModelKind::Forest, &empty, &ModelParams::default()),
            Err(ModelError::EmptyTrainingSet)
        ));
    }
}
