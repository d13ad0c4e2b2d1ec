//! HTTP API over the predictor.
//!
//! **Service:**
//! - `GET  /`: service description and endpoint list
//! - `GET  /health`: liveness
//!
//! **Prediction:**
//! - `POST /predict/knn`, `POST /predict/forest`: `{ "features": [..4 numbers..] }`
//! - `POST /ml/predict`: `{ "features": [...], "model_type": "auto"|"knn"|"forest" }`
//! - `GET  /ml/models`, `GET /ml/status`
//! - `POST /ml/retrain/{kind}`: retrain and persist one model
//!
//! **Performance metrics:**
//! - `GET  /perf/health`, `GET /perf/status`, `POST /perf/mark`
//!
//! Every error is returned as `{ "detail": "..." }`: 422 for bad input, 500
//! for everything else.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::client::{DetailedPredictRequest, ErrorBody, HealthResponse, PredictRequest};
use crate::dataset::{self, FEATURE_NAMES};
use crate::error::{ModelError, TriadError};
use crate::metrics::MetricSummary;
use crate::model::{ModelChoice, ModelKind};
use crate::predictor::{DetailedPrediction, Prediction, Predictor};
use crate::validate;

/// Paths listed by `GET /`.
pub const ENDPOINTS: &[&str] = &[
    "/health",
    "/predict/knn",
    "/predict/forest",
    "/ml/predict",
    "/ml/models",
    "/ml/status",
    "/ml/retrain/{kind}",
    "/perf/health",
    "/perf/status",
    "/perf/mark",
];

// ── State ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub predictor: Predictor,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self { predictor }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict/knn", post(predict_knn))
        .route("/predict/forest", post(predict_forest))
        .route("/ml/predict", post(ml_predict))
        .route("/ml/models", get(ml_models))
        .route("/ml/status", get(ml_status))
        .route("/ml/retrain/{kind}", post(ml_retrain))
        .route("/perf/health", get(perf_health))
        .route("/perf/status", get(perf_status))
        .route("/perf/mark", post(perf_mark))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

/// An error response: status code plus `{ "detail": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl From<TriadError> for ApiError {
    fn from(err: TriadError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run CPU-bound predictor work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, TriadError> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TriadError::from(ModelError::from(e)))?;
    Ok(outcome?)
}

// ── Service ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct RootResponse {
    ok: bool,
    message: String,
    version: String,
    endpoints: Vec<String>,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        ok: true,
        message: "Iris classifier API (knn, forest)".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

// ── Prediction ────────────────────────────────────────────────────────────

async fn predict_knn(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Prediction> {
    predict_with(&state, ModelKind::Knn, body?.0).await
}

async fn predict_forest(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Prediction> {
    predict_with(&state, ModelKind::Forest, body?.0).await
}

async fn predict_with(
    state: &AppState,
    kind: ModelKind,
    req: PredictRequest,
) -> ApiResult<Prediction> {
    let predictor = state.predictor.clone();
    let prediction = blocking(move || predictor.predict(kind, &req.features)).await?;
    Ok(Json(prediction))
}

async fn ml_predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DetailedPredictRequest>, JsonRejection>,
) -> ApiResult<DetailedPrediction> {
    let Json(req) = body?;
    let choice: ModelChoice = req
        .model_type
        .as_deref()
        .unwrap_or("auto")
        .parse()
        .map_err(TriadError::from)?;
    let predictor = state.predictor.clone();
    let prediction = blocking(move || predictor.predict_detailed(choice, &req.features)).await?;
    Ok(Json(prediction))
}

#[derive(Serialize, Deserialize)]
struct ModelInfo {
    input_format: String,
    feature_names: Vec<String>,
    target_names: Vec<String>,
    supported_types: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ModelsResponse {
    available_models: Vec<String>,
    default_model: String,
    model_info: ModelInfo,
}

async fn ml_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let predictor = &state.predictor;
    Json(ModelsResponse {
        available_models: predictor.list_models().into_iter().map(String::from).collect(),
        default_model: predictor.default_model().into(),
        model_info: ModelInfo {
            input_format: validate::expected_input(),
            feature_names: FEATURE_NAMES.iter().map(|f| f.to_string()).collect(),
            target_names: dataset::target_names(),
            supported_types: vec!["classification".into()],
        },
    })
}

#[derive(Serialize, Deserialize)]
struct DatasetInfo {
    name: String,
    samples: usize,
    features: usize,
    classes: usize,
}

#[derive(Serialize, Deserialize)]
struct StatusResponse {
    /// A non-empty training set is available, so any kind can be served.
    predictor_ready: bool,
    /// Kind → whether it is loaded in memory.
    models_loaded: BTreeMap<String, bool>,
    /// Kind → whether an artifact exists on disk.
    artifacts: BTreeMap<String, bool>,
    dataset: DatasetInfo,
    model_dir: String,
}

async fn ml_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let cache = state.predictor.cache();
    Json(StatusResponse {
        predictor_ready: !cache.dataset().is_empty(),
        models_loaded: per_kind(|k| cache.is_loaded(k)),
        artifacts: per_kind(|k| cache.store().exists(k)),
        dataset: DatasetInfo {
            name: "iris".into(),
            samples: cache.dataset().len(),
            features: dataset::N_FEATURES,
            classes: dataset::N_CLASSES,
        },
        model_dir: cache.store().dir().display().to_string(),
    })
}

fn per_kind(f: impl Fn(ModelKind) -> bool) -> BTreeMap<String, bool> {
    ModelKind::ALL.iter().map(|k| (k.to_string(), f(*k))).collect()
}

#[derive(Serialize, Deserialize)]
struct RetrainResponse {
    model: ModelKind,
    retrained: bool,
    trained_at: String,
    summary: String,
}

async fn ml_retrain(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<RetrainResponse> {
    let kind: ModelKind = kind.parse().map_err(TriadError::from)?;
    let cache = Arc::clone(state.predictor.cache());
    let model = blocking(move || cache.retrain(kind)).await?;
    tracing::info!(kind = %kind, "model retrained via API");
    Ok(Json(RetrainResponse {
        model: kind,
        retrained: true,
        trained_at: model.trained_at.to_rfc3339(),
        summary: model.summary(),
    }))
}

// ── Performance metrics ───────────────────────────────────────────────────

async fn perf_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Serialize, Deserialize)]
struct PerfStatusResponse {
    metrics: BTreeMap<String, MetricSummary>,
    metrics_count: usize,
}

async fn perf_status(State(state): State<Arc<AppState>>) -> Json<PerfStatusResponse> {
    let metrics = state.predictor.metrics().snapshot();
    Json(PerfStatusResponse {
        metrics_count: metrics.len(),
        metrics,
    })
}

#[derive(Serialize, Deserialize)]
struct PerfMarkRequest {
    name: String,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct PerfMarkResponse {
    recorded: bool,
    name: String,
    meta: Option<serde_json::Value>,
}

async fn perf_mark(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PerfMarkRequest>, JsonRejection>,
) -> ApiResult<PerfMarkResponse> {
    let Json(req) = body?;
    // Marks carry no duration; zero still counts.
    state.predictor.metrics().record(&req.name, 0.0);
    Ok(Json(PerfMarkResponse {
        recorded: true,
        name: req.name,
        meta: req.meta,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ValidationError};

    #[test]
    fn client_errors_map_to_422() {
        let err: ApiError = TriadError::from(ValidationError::NotFinite { index: 0 }).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.detail.contains("finite"));

        let err: ApiError = TriadError::from(ModelError::UnknownKind { name: "svm".into() }).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn other_errors_map_to_500() {
        let err: ApiError = TriadError::from(StoreError::Serialization {
            message: "boom".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn panicked_blocking_task_is_a_500() {
        let err = blocking(|| -> Result<(), TriadError> { panic!("fit exploded") })
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail.contains("training task failed"), "{}", err.detail);
    }

    #[tokio::test]
    async fn blocking_passes_client_errors_through() {
        let err = blocking(|| -> Result<(), TriadError> {
            Err(ValidationError::NotFinite { index: 2 }.into())
        })
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn endpoint_list_covers_prediction_routes() {
        assert!(ENDPOINTS.contains(&"/predict/knn"));
        assert!(ENDPOINTS.contains(&"/ml/predict"));
        assert!(ENDPOINTS.contains(&"/perf/mark"));
    }
}
