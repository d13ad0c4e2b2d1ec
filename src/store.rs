//! On-disk model artifacts.
//!
//! One file per model kind inside the model directory. Each file is the
//! 8-byte magic `TRIADMDL`, a little-endian `u16` format version, then the
//! bincode-encoded [`TrainedModel`]. Writes go to a temporary sibling first
//! and are renamed into place, so readers never observe a half-written file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::model::{ModelKind, TrainedModel};
use crate::paths::artifact_file_name;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

const MAGIC: &[u8; 8] = b"TRIADMDL";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Distinguishes concurrent saves within one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory of persisted models.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(artifact_file_name(kind))
    }

    pub fn exists(&self, kind: ModelKind) -> bool {
        self.path_for(kind).is_file()
    }

    /// Persist a model, replacing any previous artifact of the same kind.
    pub fn save(&self, model: &TrainedModel) -> StoreResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let payload = bincode::serialize(model).map_err(|e| StoreError::Serialization {
            message: format!("failed to encode {} model: {e}", model.kind),
        })?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);

        let path = self.path_for(model.kind);
        let tmp = temp_path(&path);
        let written = std::fs::write(&tmp, &bytes)
            .map_err(|e| io_error(&tmp, e))
            .and_then(|()| std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e)));
        if let Err(e) = written {
            match std::fs::remove_file(&tmp) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary artifact");
                }
                _ => {}
            }
            return Err(e);
        }

        tracing::debug!(kind = %model.kind, path = %path.display(), bytes = bytes.len(), "model saved");
        Ok(path)
    }

    /// Load the artifact for `kind`. Returns `Ok(None)` if there is none.
    pub fn load(&self, kind: ModelKind) -> StoreResult<Option<TrainedModel>> {
        let path = self.path_for(kind);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(corrupt("missing TRIADMDL header".into()));
        }
        let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let model: TrainedModel = bincode::deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| corrupt(format!("decode failed: {e}")))?;
        if model.kind != kind {
            return Err(corrupt(format!(
                "file holds a {} model, expected {kind}",
                model.kind
            )));
        }

        tracing::debug!(kind = %kind, path = %path.display(), "model loaded");
        Ok(Some(model))
    }

    /// Delete the artifact for `kind`. Returns whether a file existed.
    pub fn remove(&self, kind: ModelKind) -> StoreResult<bool> {
        let path = self.path_for(kind);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// `<artifact>.<pid>.<seq>.tmp` next to the artifact, unique per writer.
fn temp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
