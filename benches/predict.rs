//! Benchmarks for model inference and training.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use triad_iris::dataset::Dataset;
use triad_iris::model::{self, Classifier, ForestParams, ModelKind, ModelParams};
use triad_iris::validate::{self, RawFeature};

const SAMPLE: [f64; 4] = [6.1, 2.8, 4.7, 1.2];

fn bench_knn_predict(c: &mut Criterion) {
    let iris = Dataset::iris().unwrap();
    let knn = model::train(ModelKind::Knn, &iris, &ModelParams::default()).unwrap();

    c.bench_function("knn_predict_proba", |bench| {
        bench.iter(|| black_box(knn.predict_proba(black_box(&SAMPLE))))
    });
}

fn bench_forest_predict(c: &mut Criterion) {
    let iris = Dataset::iris().unwrap();
    let forest = model::train(ModelKind::Forest, &iris, &ModelParams::default()).unwrap();

    c.bench_function("forest_predict_proba_100", |bench| {
        bench.iter(|| black_box(forest.predict_proba(black_box(&SAMPLE))))
    });
}

fn bench_forest_fit(c: &mut Criterion) {
    let iris = Dataset::iris().unwrap();
    let params = ModelParams {
        forest: ForestParams {
            n_estimators: 20,
            ..Default::default()
        },
        ..Default::default()
    };

    c.bench_function("forest_fit_20", |bench| {
        bench.iter(|| black_box(model::train(ModelKind::Forest, &iris, &params).unwrap()))
    });
}

fn bench_validate(c: &mut Criterion) {
    let raw: Vec<RawFeature> = vec![5.1.into(), "3.5".into(), 1.4.into(), 0.2.into()];

    c.bench_function("validate_mixed", |bench| {
        bench.iter(|| black_box(validate::validate(black_box(&raw)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_knn_predict,
    bench_forest_predict,
    bench_forest_fit,
    bench_validate
);
criterion_main!(benches);
