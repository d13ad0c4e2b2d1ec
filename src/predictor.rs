//! Request-level prediction: validate, fetch the model, classify.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cache::ModelCache;
use crate::config::TriadConfig;
use crate::error::TriadResult;
use crate::metrics::MetricsRegistry;
use crate::model::{Classifier, ModelChoice, ModelKind, TrainedModel, argmax};
use crate::store::ArtifactStore;
use crate::validate::{self, FeatureEcho, Features, RawFeature};

/// Response of the per-model prediction endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub model: ModelKind,
    pub label: String,
    /// Probability per target name.
    pub proba: BTreeMap<String, f64>,
    pub features: FeatureEcho,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDetail {
    pub label: String,
    pub index: usize,
    pub probabilities: BTreeMap<String, f64>,
}

/// Response of `/ml/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedPrediction {
    pub prediction: PredictionDetail,
    pub model_used: ModelKind,
    /// Highest class probability.
    pub confidence: f64,
    pub processing_time_ms: f64,
}

/// Cheap to clone; all clones share the cache and metrics.
#[derive(Debug, Clone)]
pub struct Predictor {
    cache: Arc<ModelCache>,
    metrics: Arc<MetricsRegistry>,
}

impl Predictor {
    pub fn new(cache: Arc<ModelCache>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { cache, metrics }
    }

    /// Wire up a predictor from configuration, with artifacts in `model_dir`.
    pub fn from_config(
        config: &TriadConfig,
        model_dir: impl Into<std::path::PathBuf>,
    ) -> TriadResult<Self> {
        let cache = ModelCache::new(ArtifactStore::new(model_dir), config.model_params())?;
        let metrics = match config.perf.enabled {
            Some(enabled) => MetricsRegistry::with_enabled(enabled),
            None => MetricsRegistry::from_env(),
        };
        Ok(Self::new(Arc::new(cache), Arc::new(metrics)))
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Validate `raw` and classify it with `kind`.
    ///
    /// Invalid input is rejected before the model is loaded.
    pub fn predict(&self, kind: ModelKind, raw: &[RawFeature]) -> TriadResult<Prediction> {
        let features = validate::validate(raw)?;
        self.predict_features(kind, &features)
    }

    pub fn predict_features(&self, kind: ModelKind, features: &Features) -> TriadResult<Prediction> {
        let model = self.cache.get(kind)?;
        let proba = self.classify(&model, features);
        let index = argmax(&proba);
        tracing::debug!(kind = %kind, class = index, "prediction");
        Ok(Prediction {
            model: kind,
            label: model.label(index),
            proba: named_probabilities(&model, &proba),
            features: features.echo(),
        })
    }

    /// Richer response shape; `auto` resolves to the forest.
    pub fn predict_detailed(
        &self,
        choice: ModelChoice,
        raw: &[RawFeature],
    ) -> TriadResult<DetailedPrediction> {
        let started = Instant::now();
        let features = validate::validate(raw)?;
        let kind = choice.resolve();
        let model = self.cache.get(kind)?;
        let proba = self.classify(&model, &features);
        let index = argmax(&proba);
        let confidence = proba.get(index).copied().unwrap_or(0.0);

        Ok(DetailedPrediction {
            prediction: PredictionDetail {
                label: model.label(index),
                index,
                probabilities: named_probabilities(&model, &proba),
            },
            model_used: kind,
            confidence,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Model names accepted by [`Predictor::predict_detailed`].
    pub fn list_models(&self) -> Vec<&'static str> {
        ModelChoice::names()
    }

    pub fn default_model(&self) -> &'static str {
        "auto"
    }

    fn classify(&self, model: &TrainedModel, features: &Features) -> Vec<f64> {
        let metric = format!("predict.{}", model.kind);
        self.metrics
            .time(&metric, || model.predict_proba(features.as_array()))
    }
}

fn named_probabilities(model: &TrainedModel, proba: &[f64]) -> BTreeMap<String, f64> {
    proba
        .iter()
        .enumerate()
        .map(|(i, p)| (model.label(i), *p))
        .collect()
}
