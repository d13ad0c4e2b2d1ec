//! Client abstraction for making predictions.
//!
//! `TriadClient` wraps either a local [`Predictor`] or an HTTP connection to
//! a running `triad-irisd` server. The CLI picks the variant from the
//! `--server` flag; both return the same response types.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ModelChoice, ModelKind};
use crate::predictor::{DetailedPrediction, Prediction, Predictor};
use crate::validate::RawFeature;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "triad-iris";

// ---------------------------------------------------------------------------
// Wire types (shared between client & server)
// ---------------------------------------------------------------------------

/// Body of `POST /predict/{knn,forest}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<RawFeature>,
}

/// Body of `POST /ml/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedPredictRequest {
    pub features: Vec<RawFeature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub service: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            service: SERVICE_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Error body returned by the server for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Client error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("remote request failed: {message}")]
    #[diagnostic(code(triad::client::request), help("Is triad-irisd running?"))]
    Request { message: String },

    #[error("server returned {status}: {detail}")]
    #[diagnostic(code(triad::client::status))]
    Status { status: u16, detail: String },

    #[error("unexpected response from server: {message}")]
    #[diagnostic(code(triad::client::response), help("Server version mismatch?"))]
    Response { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Local(#[from] crate::error::TriadError),
}

pub type ClientResult<T> = Result<T, ClientError>;

// ---------------------------------------------------------------------------
// TriadClient
// ---------------------------------------------------------------------------

/// Either an in-process predictor or a remote HTTP connection.
pub enum TriadClient {
    Local(Predictor),
    Remote { base_url: String, http: ureq::Agent },
}

impl TriadClient {
    pub fn local(predictor: Predictor) -> Self {
        TriadClient::Local(predictor)
    }

    /// Connect to a server at `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn remote(base_url: &str) -> Self {
        TriadClient::Remote {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: ureq::Agent::new(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, TriadClient::Remote { .. })
    }

    pub fn health(&self) -> ClientResult<HealthResponse> {
        match self {
            TriadClient::Local(_) => Ok(HealthResponse::healthy()),
            TriadClient::Remote { .. } => self.get_json("/health"),
        }
    }

    pub fn predict(&self, kind: ModelKind, features: Vec<RawFeature>) -> ClientResult<Prediction> {
        match self {
            TriadClient::Local(p) => Ok(p.predict(kind, &features)?),
            TriadClient::Remote { .. } => {
                self.post_json(&format!("/predict/{kind}"), &PredictRequest { features })
            }
        }
    }

    pub fn predict_detailed(
        &self,
        choice: ModelChoice,
        features: Vec<RawFeature>,
    ) -> ClientResult<DetailedPrediction> {
        match self {
            TriadClient::Local(p) => Ok(p.predict_detailed(choice, &features)?),
            TriadClient::Remote { .. } => {
                let model_type = match choice {
                    ModelChoice::Auto => "auto".to_string(),
                    ModelChoice::Kind(kind) => kind.to_string(),
                };
                self.post_json(
                    "/ml/predict",
                    &DetailedPredictRequest {
                        features,
                        model_type: Some(model_type),
                    },
                )
            }
        }
    }

    // -- helpers for remote calls --

    fn url(&self, path: &str) -> String {
        match self {
            TriadClient::Remote { base_url, .. } => format!("{base_url}{path}"),
            TriadClient::Local(_) => unreachable!("url called on local client"),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let TriadClient::Remote { http, .. } = self else {
            unreachable!("get_json called on local client");
        };
        let resp = http.get(&self.url(path)).call().map_err(map_ureq_error)?;
        resp.into_json().map_err(|e| ClientError::Response {
            message: format!("failed to parse JSON: {e}"),
        })
    }

    fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let TriadClient::Remote { http, .. } = self else {
            unreachable!("post_json called on local client");
        };
        let resp = http
            .post(&self.url(path))
            .send_json(body)
            .map_err(map_ureq_error)?;
        resp.into_json().map_err(|e| ClientError::Response {
            message: format!("failed to parse JSON: {e}"),
        })
    }
}

fn map_ureq_error(err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or(body);
            ClientError::Status { status, detail }
        }
        other => ClientError::Request {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::cache::ModelCache;
    use crate::metrics::MetricsRegistry;
    use crate::model::ModelParams;
    use crate::store::ArtifactStore;

    fn local_client(dir: &TempDir) -> TriadClient {
        let cache = ModelCache::new(ArtifactStore::new(dir.path()), ModelParams::default()).unwrap();
        TriadClient::local(Predictor::new(
            Arc::new(cache),
            Arc::new(MetricsRegistry::default()),
        ))
    }

    #[test]
    fn remote_base_url_is_normalized() {
        let client = TriadClient::remote("http://127.0.0.1:8000/");
        assert!(client.is_remote());
        assert_eq!(client.url("/health"), "http://127.0.0.1:8000/health");
    }

    #[test]
    fn local_health_is_healthy() {
        let dir = TempDir::new().unwrap();
        let health = local_client(&dir).health().unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, SERVICE_NAME);
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }

    #[test]
    fn local_predictions_and_errors() {
        let dir = TempDir::new().unwrap();
        let client = local_client(&dir);
        let out = client
            .predict(ModelKind::Knn, vec![5.1.into(), 3.5.into(), 1.4.into(), 0.2.into()])
            .unwrap();
        assert_eq!(out.label, "setosa");

        let err = client
            .predict(ModelKind::Knn, vec![1.0.into()])
            .unwrap_err();
        assert!(matches!(err, ClientError::Local(ref e) if e.is_client_error()));
    }

    #[test]
    fn unreachable_server_is_a_request_error() {
        // Port 9 (discard) is almost never served on loopback.
        let client = TriadClient::remote("http://127.0.0.1:9");
        assert!(matches!(client.health(), Err(ClientError::Request { .. })));
    }

    #[test]
    fn detailed_request_omits_missing_model_type() {
        let body = DetailedPredictRequest {
            features: vec![1.0.into()],
            model_type: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"features":[1.0]}"#);
    }
}
