//! Service configuration: TOML file, environment overrides, defaults.
//!
//! Every key is optional. Precedence is command line > environment > file >
//! built-in defaults. [`Settings`] resolves the config file and model
//! directory; the binaries apply their remaining flags themselves.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::TriadResult;
use crate::model::{ForestParams, KnnParams, ModelParams};
use crate::paths::TriadPaths;

/// Errors from loading or saving configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(triad::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(triad::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(triad::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: \"{value}\"")]
    #[diagnostic(code(triad::config::env))]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Full configuration, persisted as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriadConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub perf: PerfConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `bind:port` socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    /// Artifact directory. `None` means the XDG data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub knn: KnnParams,
    #[serde(default)]
    pub forest: ForestParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerfConfig {
    /// Overrides `PERF_ENABLED` when set.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl TriadConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Load from a TOML file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Apply `TRIAD_SERVER_BIND`, `TRIAD_SERVER_PORT` and `TRIAD_MODEL_DIR`
    /// from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TRIAD_SERVER_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("TRIAD_SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRIAD_SERVER_PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Some(dir) = lookup("TRIAD_MODEL_DIR") {
            self.models.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Hyperparameters for training.
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            knn: self.models.knn.clone(),
            forest: self.models.forest.clone(),
        }
    }
}
/// Effective configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: TriadConfig,
    pub config_file: PathBuf,
    pub model_dir: PathBuf,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn resolve(config_file: Option<&Path>, model_dir: Option<&Path>) -> TriadResult<Self> {
        Self::resolve_with(config_file, model_dir, |key| std::env::var(key).ok())
    }

    /// Explicit paths win. XDG directories are resolved only for locations
    /// still unknown, so `HOME` is not needed when both are given.
    pub fn resolve_with<F>(
        config_file: Option<&Path>,
        model_dir: Option<&Path>,
        lookup: F,
    ) -> TriadResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_file = match config_file {
            Some(path) => path.to_path_buf(),
            None => TriadPaths::resolve_with(&lookup)?.config_file(),
        };
        let mut config = TriadConfig::load_or_default(&config_file)?;
        config.apply_overrides(&lookup)?;

        let model_dir = match (model_dir, &config.models.dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => TriadPaths::resolve_with(&lookup)?.models_dir(),
        };

        Ok(Self {
            config,
            config_file,
            model_dir,
        })
    }
}
