// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # triad-iris
//!
//! Iris species classification served from Rust: a k-nearest-neighbours
//! model and a random forest, trained on the embedded Iris dataset,
//! persisted as artifacts and served over HTTP.
//!
//! ## Architecture
//!
//! - **Dataset** (`dataset`): the 150-sample Iris table plus a CSV loader
//! - **Validation** (`validate`): raw JSON feature lists → four finite numbers
//! - **Models** (`model`): KNN and random forest behind one `Classifier` trait
//! - **Artifacts** (`store`): versioned bincode files with atomic writes
//! - **Cache** (`cache`): lazy load-or-train, one shared instance per kind
//! - **Prediction** (`predictor`): validation + cache + response shaping
//! - **HTTP** (`server`, feature `server`): axum router over the predictor
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use triad_iris::cache::ModelCache;
//! use triad_iris::metrics::MetricsRegistry;
//! use triad_iris::model::{ModelKind, ModelParams};
//! use triad_iris::predictor::Predictor;
//! use triad_iris::store::ArtifactStore;
//!
//! let cache = ModelCache::new(ArtifactStore::new("/tmp/iris-models"), ModelParams::default()).unwrap();
//! let predictor = Predictor::new(Arc::new(cache), Arc::new(MetricsRegistry::default()));
//! let out = predictor
//!     .predict(ModelKind::Knn, &[5.1.into(), 3.5.into(), 1.4.into(), 0.2.into()])
//!     .unwrap();
//! assert_eq!(out.label, "setosa");
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod model;
pub mod paths;
pub mod predictor;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod validate;
