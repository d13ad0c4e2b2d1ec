//! Rich diagnostic error types for triad-iris.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know what went wrong and how
//! to fix it. [`TriadError`] wraps them all for APIs that cross subsystems.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::paths::PathError;

/// Top-level error type for the crate.
#[derive(Debug, Error, Diagnostic)]
pub enum TriadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

impl TriadError {
    /// Whether the error was caused by caller input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TriadError::Validation(_) | TriadError::Model(ModelError::UnknownKind { .. })
        )
    }
}

/// Result alias used throughout the crate.
pub type TriadResult<T> = std::result::Result<T, TriadError>;

// ---------------------------------------------------------------------------
// Dataset errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("failed to read dataset file: {path}")]
    #[diagnostic(
        code(triad::dataset::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is empty")]
    #[diagnostic(
        code(triad::dataset::empty),
        help("Provide a header row followed by at least one sample row.")
    )]
    Empty,

    #[error("line {line}: expected {expected} columns, found {found}")]
    #[diagnostic(
        code(triad::dataset::columns),
        help(
            "Each row must hold sepal_length, sepal_width, petal_length, petal_width \
             and the species, separated by commas."
        )
    )]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: cannot parse \"{value}\" as a number")]
    #[diagnostic(code(triad::dataset::number))]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: unknown species \"{value}\"")]
    #[diagnostic(
        code(triad::dataset::species),
        help("Use setosa, versicolor or virginica (an `Iris-` prefix is allowed), or 0/1/2.")
    )]
    UnknownSpecies { line: usize, value: String },
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ValidationError {
    #[error(
        "features must be a list of exactly {expected} numbers \
         [sepal_length, sepal_width, petal_length, petal_width], got {actual}"
    )]
    #[diagnostic(code(triad::validate::length))]
    WrongLength { expected: usize, actual: usize },

    #[error("features must be numeric: entry {index} is {value}")]
    #[diagnostic(code(triad::validate::not_numeric))]
    NotNumeric { index: usize, value: String },

    #[error("features must be finite: entry {index} is NaN or infinite")]
    #[diagnostic(code(triad::validate::not_finite))]
    NotFinite { index: usize },
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("unknown model type: \"{name}\"")]
    #[diagnostic(
        code(triad::model::unknown_kind),
        help("Available model types are: auto, knn, forest.")
    )]
    UnknownKind { name: String },

    #[error("invalid model parameters: {message}")]
    #[diagnostic(
        code(triad::model::params),
        help("Check the [models] section of the configuration file.")
    )]
    InvalidParams { message: String },

    #[error("cannot fit a model on an empty dataset")]
    #[diagnostic(code(triad::model::empty_fit))]
    EmptyTrainingSet,

    #[error("model training task failed: {message}")]
    #[diagnostic(code(triad::model::training))]
    Training { message: String },
}

/// A panicked or cancelled blocking task that was fitting or loading a model.
#[cfg(feature = "server")]
impl From<tokio::task::JoinError> for ModelError {
    fn from(err: tokio::task::JoinError) -> Self {
        ModelError::Training {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on model artifact {path}: {source}")]
    #[diagnostic(
        code(triad::store::io),
        help(
            "A filesystem operation failed. Check that the model directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(code(triad::store::serde))]
    Serialization { message: String },

    #[error("corrupt model artifact {path}: {reason}")]
    #[diagnostic(
        code(triad::store::corrupt),
        help("Delete the file or run `triad train` to regenerate it.")
    )]
    Corrupt { path: String, reason: String },
}
