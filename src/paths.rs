//! XDG-compliant path resolution for triad-iris.
//!
//! Model artifacts live under `$XDG_DATA_HOME/triad-iris/models/` unless the
//! configuration or the command line points somewhere else.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::model::ModelKind;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(triad::paths::no_home),
        help(
            "Set HOME or the XDG_*_HOME variables, or pass --config together with \
             --model-dir (or TRIAD_MODEL_DIR)."
        )
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(triad::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for triad-iris.
#[derive(Debug, Clone)]
pub struct TriadPaths {
    /// `$XDG_CONFIG_HOME/triad-iris/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/triad-iris/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/triad-iris/`
    pub state_dir: PathBuf,
}

impl TriadPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup. `HOME` is only consulted for
    /// directories whose XDG variable is unset or empty.
    pub fn resolve_with<F>(lookup: F) -> PathResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);
        let xdg = |var: &str, fallback: &str| -> PathResult<PathBuf> {
            let base = match lookup(var).filter(|v| !v.is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => home.as_ref().ok_or(PathError::NoHome)?.join(fallback),
            };
            Ok(base.join("triad-iris"))
        };

        Ok(Self {
            config_dir: xdg("XDG_CONFIG_HOME", ".config")?,
            data_dir: xdg("XDG_DATA_HOME", ".local/share")?,
            state_dir: xdg("XDG_STATE_HOME", ".local/state")?,
        })
    }

    /// Root all directories under a single base (handy for tests and portable installs).
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            config_dir: base.join("config"),
            data_dir: base.join("data"),
            state_dir: base.join("state"),
        }
    }

    /// Default directory for persisted model artifacts.
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

/// Create a directory and its parents, mapping the failure into a [`PathError`].
pub fn ensure_dir(dir: &Path) -> PathResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
        path: dir.display().to_string(),
        source: e,
    })
}

/// File name of the artifact for a model kind inside the model directory.
pub fn artifact_file_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Knn => "iris_knn.bin",
        ModelKind::Forest => "random_forest_iris.bin",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn home_fallbacks_follow_xdg_layout() {
        let env = vars(&[("HOME", "/home/ada")]);
        let paths = TriadPaths::resolve_with(|k| env.get(k).cloned()).unwrap();
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/home/ada/.config/triad-iris/config.toml")
        );
        assert_eq!(
            paths.models_dir(),
            PathBuf::from("/home/ada/.local/share/triad-iris/models")
        );
        assert_eq!(
            paths.state_dir,
            PathBuf::from("/home/ada/.local/state/triad-iris")
        );
    }

    #[test]
    fn xdg_variables_replace_home() {
        let env = vars(&[
            ("XDG_CONFIG_HOME", "/etc/xdg"),
            ("XDG_DATA_HOME", "/var/lib"),
            ("XDG_STATE_HOME", "/var/state"),
        ]);
        let paths = TriadPaths::resolve_with(|k| env.get(k).cloned()).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/etc/xdg/triad-iris"));
        assert_eq!(
            paths.models_dir(),
            PathBuf::from("/var/lib/triad-iris/models")
        );
    }

    #[test]
    fn missing_home_is_reported() {
        let env = vars(&[("XDG_CONFIG_HOME", "/etc/xdg"), ("HOME", "")]);
        assert!(matches!(
            TriadPaths::resolve_with(|k| env.get(k).cloned()),
            Err(PathError::NoHome)
        ));
    }

    #[test]
    fn rooted_paths_derive_from_base() {
        let paths = TriadPaths::rooted_at(Path::new("/srv/triad"));
        assert_eq!(paths.models_dir(), PathBuf::from("/srv/triad/data/models"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/srv/triad/config/config.toml")
        );
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let models = TriadPaths::rooted_at(dir.path()).models_dir();
        ensure_dir(&models).unwrap();
        ensure_dir(&models).unwrap();
        assert!(models.is_dir());
    }

    #[test]
    fn artifact_names_follow_model_kind() {
        assert_eq!(artifact_file_name(ModelKind::Knn), "iris_knn.bin");
        assert_eq!(
            artifact_file_name(ModelKind::Forest),
            "random_forest_iris.bin"
        );
    }
}
