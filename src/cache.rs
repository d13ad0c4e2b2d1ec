//! Lazily loaded, shared model instances.
//!
//! [`ModelCache::get`] serves a model from memory, then from its on-disk
//! artifact, and as a last resort trains it on the configured dataset and
//! persists the result. Loading and training are serialized so concurrent
//! callers end up holding the same `Arc`.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::dataset::Dataset;
use crate::error::TriadResult;
use crate::model::{self, ModelKind, ModelParams, TrainedModel};
use crate::store::ArtifactStore;

pub struct ModelCache {
    models: DashMap<ModelKind, Arc<TrainedModel>>,
    load_lock: Mutex<()>,
    store: ArtifactStore,
    params: ModelParams,
    dataset: Dataset,
}

impl ModelCache {
    /// Cache that trains on the embedded Iris dataset.
    pub fn new(store: ArtifactStore, params: ModelParams) -> TriadResult<Self> {
        Ok(Self::with_dataset(store, params, Dataset::iris()?))
    }

    pub fn with_dataset(store: ArtifactStore, params: ModelParams, dataset: Dataset) -> Self {
        Self {
            models: DashMap::new(),
            load_lock: Mutex::new(()),
            store,
            params,
            dataset,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Shared model for `kind`, loading or training it on first use.
    pub fn get(&self, kind: ModelKind) -> TriadResult<Arc<TrainedModel>> {
        if let Some(model) = self.models.get(&kind) {
            return Ok(Arc::clone(model.value()));
        }

        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have finished while we waited.
        if let Some(model) = self.models.get(&kind) {
            return Ok(Arc::clone(model.value()));
        }

        let model = match self.store.load(kind) {
            Ok(Some(model)) => {
                tracing::info!(kind = %kind, path = %self.store.path_for(kind).display(), "loaded model artifact");
                model
            }
            Ok(None) => {
                tracing::info!(kind = %kind, "no artifact found, training");
                self.train_and_persist(kind)?
            }
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "unusable artifact, retraining");
                self.train_and_persist(kind)?
            }
        };

        let model = Arc::new(model);
        self.models.insert(kind, Arc::clone(&model));
        Ok(model)
    }

    /// Train a fresh model, persist it, and replace the cached instance.
    pub fn retrain(&self, kind: ModelKind) -> TriadResult<Arc<TrainedModel>> {
        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let model = Arc::new(self.train_and_persist(kind)?);
        self.models.insert(kind, Arc::clone(&model));
        Ok(model)
    }

    /// Drop the in-memory instance. Returns whether one was loaded.
    pub fn evict(&self, kind: ModelKind) -> bool {
        self.models.remove(&kind).is_some()
    }

    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    /// Loaded kinds in canonical order.
    pub fn loaded_kinds(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .into_iter()
            .filter(|k| self.is_loaded(*k))
            .collect()
    }

    /// Load every model kind.
    pub fn warm_all(&self) -> TriadResult<()> {
        for kind in ModelKind::ALL {
            self.get(kind)?;
        }
        Ok(())
    }

    fn train_and_persist(&self, kind: ModelKind) -> TriadResult<TrainedModel> {
        let model = model::train(kind, &self.dataset, &self.params)?;
        if let Err(err) = self.store.save(&model) {
            tracing::warn!(kind = %kind, error = %err, "failed to persist model, serving from memory");
        }
        Ok(model)
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("loaded", &self.loaded_kinds())
            .field("dir", &self.store.dir())
            .finish()
    }
}
