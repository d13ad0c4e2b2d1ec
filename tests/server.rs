//! HTTP surface tests: a real server on an ephemeral port, driven with ureq.

#![cfg(feature = "server")]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use triad_iris::cache::ModelCache;
use triad_iris::client::{ClientError, TriadClient};
use triad_iris::metrics::MetricsRegistry;
use triad_iris::model::{ForestParams, ModelChoice, ModelKind, ModelParams};
use triad_iris::predictor::Predictor;
use triad_iris::server::{self, AppState};
use triad_iris::store::ArtifactStore;

async fn spawn_server(dir: &TempDir) -> (SocketAddr, Predictor) {
    let params = ModelParams {
        forest: ForestParams {
            n_estimators: 20,
            ..Default::default()
        },
        ..Default::default()
    };
    let cache = ModelCache::new(ArtifactStore::new(dir.path()), params).unwrap();
    let predictor = Predictor::new(Arc::new(cache), Arc::new(MetricsRegistry::with_enabled(true)));
    let app = server::router(Arc::new(AppState::new(predictor.clone())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, predictor)
}

/// `(status, body)` for a request; ureq reports 4xx/5xx as errors.
fn call(method: &str, url: &str, body: Option<&str>) -> (u16, Value) {
    let req = ureq::request(method, url).set("Content-Type", "application/json");
    let result = match body {
        Some(b) => req.send_string(b),
        None => req.call(),
    };
    let resp = match result {
        Ok(resp) => resp,
        Err(ureq::Error::Status(_, resp)) => resp,
        Err(e) => panic!("transport error: {e}"),
    };
    let status = resp.status();
    (status, resp.into_json().unwrap())
}

async fn request(method: &'static str, url: String, body: Option<String>) -> (u16, Value) {
    tokio::task::spawn_blocking(move || call(method, &url, body.as_deref()))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_and_health() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = spawn_server(&dir).await;

    let (status, body) = request("GET", format!("http://{addr}/"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    assert!(body["endpoints"].as_array().unwrap().iter().any(|e| e == "/predict/knn"));

    let (status, body) = request("GET", format!("http://{addr}/health"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "triad-iris");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn predict_endpoints_return_prediction_shape() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = spawn_server(&dir).await;
    let body = json!({ "features": [5.1, 3.5, 1.4, 0.2] }).to_string();

    for kind in ["knn", "forest"] {
        let (status, out) =
            request("POST", format!("http://{addr}/predict/{kind}"), Some(body.clone())).await;
        assert_eq!(status, 200, "{out}");
        assert_eq!(out["model"], kind);
        assert_eq!(out["label"], "setosa");
        let proba = out["proba"].as_object().unwrap();
        assert_eq!(proba.len(), 3);
        let sum: f64 = proba.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(out["features"]["sepal_length"], 5.1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_input_is_422_with_detail() {
    let dir = TempDir::new().unwrap();
    let (addr, predictor) = spawn_server(&dir).await;
    let url = format!("http://{addr}/predict/knn");

    let cases = [
        json!({ "features": [1.0, 2.0] }).to_string(),
        json!({ "features": ["a", "b", "c", "d"] }).to_string(),
        json!({ "features": [1, 2, null, 4] }).to_string(),
        json!({ "wrong": [] }).to_string(),
        "{not json".to_string(),
    ];
    for body in cases {
        let (status, out) = request("POST", url.clone(), Some(body.clone())).await;
        assert_eq!(status, 422, "body {body} -> {out}");
        assert!(out["detail"].is_string(), "missing detail for {body}");
    }
    // Validation failures never load a model.
    assert!(!predictor.cache().is_loaded(ModelKind::Knn));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ml_routes() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = spawn_server(&dir).await;

    let (status, out) = request(
        "POST",
        format!("http://{addr}/ml/predict"),
        Some(json!({ "features": [6.7, 3.0, 5.2, 2.3] }).to_string()),
    )
    .await;
    assert_eq!(status, 200, "{out}");
    assert_eq!(out["model_used"], "forest");
    assert_eq!(out["prediction"]["label"], "virginica");
    assert_eq!(out["prediction"]["index"], 2);
    assert!(out["confidence"].as_f64().unwrap() > 0.5);

    let (status, out) = request(
        "POST",
        format!("http://{addr}/ml/predict"),
        Some(json!({ "features": [6.7, 3.0, 5.2, 2.3], "model_type": "svm" }).to_string()),
    )
    .await;
    assert_eq!(status, 422);
    assert!(out["detail"].as_str().unwrap().contains("svm"));

    let (_, models) = request("GET", format!("http://{addr}/ml/models"), None).await;
    assert_eq!(models["available_models"], json!(["auto", "knn", "forest"]));
    assert_eq!(models["default_model"], "auto");

    let (_, status_body) = request("GET", format!("http://{addr}/ml/status"), None).await;
    assert_eq!(status_body["predictor_ready"], true);
    assert_eq!(status_body["models_loaded"]["forest"], true);
    assert_eq!(status_body["models_loaded"]["knn"], false);
    assert_eq!(status_body["dataset"]["samples"], 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retrain_route() {
    let dir = TempDir::new().unwrap();
    let (addr, predictor) = spawn_server(&dir).await;

    let (status, out) = request("POST", format!("http://{addr}/ml/retrain/knn"), None).await;
    assert_eq!(status, 200, "{out}");
    assert_eq!(out["model"], "knn");
    assert_eq!(out["retrained"], true);
    assert!(predictor.cache().is_loaded(ModelKind::Knn));
    assert!(predictor.cache().store().exists(ModelKind::Knn));

    let (status, _) = request("POST", format!("http://{addr}/ml/retrain/svm"), None).await;
    assert_eq!(status, 422);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn perf_routes() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = spawn_server(&dir).await;

    let (_, health) = request("GET", format!("http://{addr}/perf/health"), None).await;
    assert_eq!(health, json!({ "ok": true }));

    let (status, mark) = request(
        "POST",
        format!("http://{addr}/perf/mark"),
        Some(json!({ "name": "deploy", "meta": { "v": 2 } }).to_string()),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(mark, json!({ "recorded": true, "name": "deploy", "meta": { "v": 2 } }));

    request(
        "POST",
        format!("http://{addr}/predict/knn"),
        Some(json!({ "features": [5.1, 3.5, 1.4, 0.2] }).to_string()),
    )
    .await;

    let (_, perf) = request("GET", format!("http://{addr}/perf/status"), None).await;
    assert_eq!(perf["metrics_count"], 2);
    assert_eq!(perf["metrics"]["deploy"]["count"], 1);
    assert_eq!(perf["metrics"]["deploy"]["total"], 0.0);
    assert_eq!(perf["metrics"]["predict.knn"]["count"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_client_round_trip() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = spawn_server(&dir).await;
    let base = format!("http://{addr}");

    tokio::task::spawn_blocking(move || {
        let client = TriadClient::remote(&base);
        assert_eq!(client.health().unwrap().status, "healthy");

        let out = client
            .predict(
                ModelKind::Knn,
                vec![7.0.into(), 3.2.into(), 4.7.into(), 1.4.into()],
            )
            .unwrap();
        assert_eq!(out.label, "versicolor");

        let detailed = client
            .predict_detailed(ModelChoice::Auto, vec![5.1.into(), 3.5.into(), 1.4.into(), 0.2.into()])
            .unwrap();
        assert_eq!(detailed.model_used, ModelKind::Forest);

        let err = client.predict(ModelKind::Forest, vec![1.0.into()]).unwrap_err();
        match err {
            ClientError::Status { status, detail } => {
                assert_eq!(status, 422);
                assert!(detail.contains("exactly 4"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    })
    .await
    .unwrap();
}
