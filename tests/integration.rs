//! End-to-end tests: dataset → training → validation → prediction.

use std::sync::Arc;

use triad_iris::cache::ModelCache;
use triad_iris::dataset::{Dataset, Species};
use triad_iris::error::{TriadError, ValidationError};
use triad_iris::evaluation;
use triad_iris::metrics::MetricsRegistry;
use triad_iris::model::{Classifier, ForestParams, ModelChoice, ModelKind, ModelParams};
use triad_iris::predictor::Predictor;
use triad_iris::store::ArtifactStore;
use triad_iris::validate::RawFeature;

fn predictor(dir: &std::path::Path) -> Predictor {
    let params = ModelParams {
        forest: ForestParams {
            n_estimators: 30,
            ..Default::default()
        },
        ..Default::default()
    };
    let cache = ModelCache::new(ArtifactStore::new(dir), params).unwrap();
    Predictor::new(Arc::new(cache), Arc::new(MetricsRegistry::default()))
}

fn features(values: [f64; 4]) -> Vec<RawFeature> {
    values.into_iter().map(RawFeature::from).collect()
}

#[test]
fn typical_flowers_are_classified_by_both_models() {
    let dir = tempfile::TempDir::new().unwrap();
    let p = predictor(dir.path());

    let cases = [
        ([5.1, 3.5, 1.4, 0.2], Species::Setosa),
        ([7.0, 3.2, 4.7, 1.4], Species::Versicolor),
        ([6.3, 3.3, 6.0, 2.5], Species::Virginica),
    ];
    for kind in ModelKind::ALL {
        for (x, species) in cases {
            let out = p.predict(kind, &features(x)).unwrap();
            assert_eq!(out.label, species.label(), "{kind} on {x:?}");
            assert_eq!(out.model, kind);
        }
    }
}

#[test]
fn borderline_sample_is_virginica() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = predictor(dir.path())
        .predict(ModelKind::Knn, &features([5.9, 3.0, 5.1, 1.8]))
        .unwrap();
    assert_eq!(out.label, "virginica");
}

#[test]
fn string_features_are_accepted() {
    let dir = tempfile::TempDir::new().unwrap();
    let raw: Vec<RawFeature> = ["5.1", "3.5", "1.4", "0.2"]
        .into_iter()
        .map(RawFeature::from)
        .collect();
    let out = predictor(dir.path()).predict(ModelKind::Forest, &raw).unwrap();
    assert_eq!(out.label, "setosa");
    assert_eq!(out.features.petal_length, 1.4);
}

#[test]
fn bad_input_is_a_validation_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let p = predictor(dir.path());

    let err = p.predict(ModelKind::Knn, &features([1.0, 2.0, 3.0, 4.0])[..3]).unwrap_err();
    assert!(matches!(
        err,
        TriadError::Validation(ValidationError::WrongLength { actual: 3, .. })
    ));
    assert!(err.is_client_error());

    let raw = vec![
        RawFeature::from(1.0),
        RawFeature::from("x"),
        RawFeature::from(3.0),
        RawFeature::from(4.0),
    ];
    assert!(matches!(
        p.predict_detailed(ModelChoice::Auto, &raw),
        Err(TriadError::Validation(ValidationError::NotNumeric { index: 1, .. }))
    ));
}

#[test]
fn detailed_and_plain_predictions_agree() {
    let dir = tempfile::TempDir::new().unwrap();
    let p = predictor(dir.path());
    let x = features([6.4, 2.8, 5.6, 2.1]);

    let plain = p.predict(ModelKind::Knn, &x).unwrap();
    let detailed = p.predict_detailed(ModelKind::Knn.into(), &x).unwrap();
    assert_eq!(detailed.prediction.label, plain.label);
    assert_eq!(detailed.prediction.probabilities, plain.proba);
    assert_eq!(detailed.model_used, ModelKind::Knn);
}

#[test]
fn eighty_twenty_holdout_scores_well() {
    let iris = Dataset::iris().unwrap();
    let (train, test) = evaluation::train_test_split(&iris, 0.2, 42).unwrap();
    assert_eq!((train.len(), test.len()), (120, 30));

    for kind in ModelKind::ALL {
        let model = triad_iris::model::train(kind, &train, &ModelParams::default()).unwrap();
        let acc = evaluation::accuracy(&model, &test);
        assert!(acc >= 0.85, "{kind} holdout accuracy {acc}");
        assert_eq!(model.n_classes(), 3);
    }
}

#[test]
fn custom_csv_dataset_drives_training() {
    let dir = tempfile::TempDir::new().unwrap();
    let csv = dir.path().join("tiny.csv");
    std::fs::write(
        &csv,
        "sepal_length,sepal_width,petal_length,petal_width,species\n\
         1,1,1,1,Iris-setosa\n1.1,1,1,1,Iris-setosa\n1,1.1,1,1,Iris-setosa\n\
         5,5,5,5,Iris-versicolor\n5.1,5,5,5,Iris-versicolor\n5,5.1,5,5,Iris-versicolor\n\
         9,9,9,9,Iris-virginica\n9.1,9,9,9,Iris-virginica\n9,9.1,9,9,Iris-virginica\n",
    )
    .unwrap();

    let data = Dataset::from_csv_path(&csv).unwrap();
    assert_eq!(data.class_counts(), [3, 3, 3]);

    let cache = ModelCache::with_dataset(
        ArtifactStore::new(dir.path().join("models")),
        ModelParams {
            knn: triad_iris::model::KnnParams { n_neighbors: 3 },
            ..Default::default()
        },
        data,
    );
    let p = Predictor::new(Arc::new(cache), Arc::new(MetricsRegistry::default()));
    let out = p.predict(ModelKind::Knn, &features([8.8, 9.0, 9.0, 9.0])).unwrap();
    assert_eq!(out.label, "virginica");
    assert_eq!(out.proba["virginica"], 1.0);
}
