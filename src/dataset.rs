//! The Iris dataset: 150 flowers, four measurements each, three species.
//!
//! The canonical copy is compiled into the binary from `data/iris.csv`
//! (scikit-learn's corrected version). Custom CSV files with the same five
//! columns can be loaded for training as well.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Number of measurements per sample.
pub const N_FEATURES: usize = 4;

/// Number of target classes.
pub const N_CLASSES: usize = 3;

/// Feature names in column order.
pub const FEATURE_NAMES: [&str; N_FEATURES] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

const IRIS_CSV: &str = include_str!("../data/iris.csv");

/// Iris species, in class-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Setosa,
    Versicolor,
    Virginica,
}

impl Species {
    pub const ALL: [Species; N_CLASSES] = [Species::Setosa, Species::Versicolor, Species::Virginica];

    /// Class index used by the classifiers.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Target name as reported in predictions.
    pub fn label(self) -> &'static str {
        match self {
            Species::Setosa => "setosa",
            Species::Versicolor => "versicolor",
            Species::Virginica => "virginica",
        }
    }

    /// Parse a species column: label, `Iris-` prefixed label, or class index.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim().trim_matches('"').to_ascii_lowercase();
        let name = name.strip_prefix("iris-").unwrap_or(&name);
        match name {
            "setosa" | "0" => Some(Species::Setosa),
            "versicolor" | "1" => Some(Species::Versicolor),
            "virginica" | "2" => Some(Species::Virginica),
            _ => None,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target names in class-index order.
pub fn target_names() -> Vec<String> {
    Species::ALL.iter().map(|s| s.label().to_string()).collect()
}

/// An in-memory labelled dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub samples: Vec<[f64; N_FEATURES]>,
    pub targets: Vec<usize>,
}

impl Dataset {
    /// The embedded 150-row Iris dataset.
    pub fn iris() -> Result<Self, DatasetError> {
        Self::parse_csv(IRIS_CSV)
    }

    /// Load a CSV file with a header row and five columns.
    pub fn from_csv_path(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse_csv(&text)
    }

    /// Parse CSV text. The first non-blank line is treated as the header.
    pub fn parse_csv(text: &str) -> Result<Self, DatasetError> {
        let mut samples = Vec::new();
        let mut targets = Vec::new();

        let mut rows = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        // Header.
        if rows.next().is_none() {
            return Err(DatasetError::Empty);
        }

        for (line_no, line) in rows {
            let cols: Vec<&str> = line.split(',').map(str::trim).collect();
            if cols.len() != N_FEATURES + 1 {
                return Err(DatasetError::ColumnCount {
                    line: line_no,
                    expected: N_FEATURES + 1,
                    found: cols.len(),
                });
            }

            let mut row = [0.0; N_FEATURES];
            for (slot, raw) in row.iter_mut().zip(&cols[..N_FEATURES]) {
                *slot = raw.parse().map_err(|_| DatasetError::InvalidNumber {
                    line: line_no,
                    value: raw.to_string(),
                })?;
            }

            let species =
                Species::parse(cols[N_FEATURES]).ok_or_else(|| DatasetError::UnknownSpecies {
                    line: line_no,
                    value: cols[N_FEATURES].to_string(),
                })?;

            samples.push(row);
            targets.push(species.index());
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self { samples, targets })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// New dataset holding the rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            samples: indices.iter().map(|&i| self.samples[i]).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Number of samples per class.
    pub fn class_counts(&self) -> [usize; N_CLASSES] {
        let mut counts = [0; N_CLASSES];
        for &t in &self.targets {
            counts[t] += 1;
        }
        counts
    }
}
