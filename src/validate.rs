//! Feature-vector validation.
//!
//! A request carries a list of raw JSON values; validation turns it into a
//! [`Features`] value that is guaranteed to hold exactly four finite numbers.
//! Numeric strings such as `"5.1"` are coerced, everything else is rejected.

use serde::{Deserialize, Serialize};

use crate::dataset::{FEATURE_NAMES, N_FEATURES};
use crate::error::ValidationError;

/// One entry of an incoming feature list, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFeature {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl From<f64> for RawFeature {
    fn from(value: f64) -> Self {
        RawFeature::Number(value)
    }
}

impl From<&str> for RawFeature {
    fn from(value: &str) -> Self {
        RawFeature::Text(value.to_string())
    }
}

impl RawFeature {
    fn to_number(&self, index: usize) -> Result<f64, ValidationError> {
        let value = match self {
            RawFeature::Number(n) => *n,
            RawFeature::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                ValidationError::NotNumeric {
                    index,
                    value: format!("\"{s}\""),
                }
            })?,
            RawFeature::Other(v) => {
                return Err(ValidationError::NotNumeric {
                    index,
                    value: v.to_string(),
                });
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ValidationError::NotFinite { index })
        }
    }
}

/// A validated feature vector:
/// `[sepal_length, sepal_width, petal_length, petal_width]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features([f64; N_FEATURES]);

impl Features {
    /// Build from four numbers, rejecting NaN and infinities.
    pub fn new(values: [f64; N_FEATURES]) -> Result<Self, ValidationError> {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NotFinite { index });
        }
        Ok(Self(values))
    }

    /// Build from a slice of numbers of any length.
    pub fn from_slice(values: &[f64]) -> Result<Self, ValidationError> {
        let array: [f64; N_FEATURES] =
            values
                .try_into()
                .map_err(|_| ValidationError::WrongLength {
                    expected: N_FEATURES,
                    actual: values.len(),
                })?;
        Self::new(array)
    }

    pub fn as_array(&self) -> &[f64; N_FEATURES] {
        &self.0
    }

    pub fn sepal_length(&self) -> f64 {
        self.0[0]
    }

    pub fn sepal_width(&self) -> f64 {
        self.0[1]
    }

    pub fn petal_length(&self) -> f64 {
        self.0[2]
    }

    pub fn petal_width(&self) -> f64 {
        self.0[3]
    }

    /// Named view echoed back in prediction responses.
    pub fn echo(&self) -> FeatureEcho {
        FeatureEcho {
            sepal_length: self.sepal_length(),
            sepal_width: self.sepal_width(),
            petal_length: self.petal_length(),
            petal_width: self.petal_width(),
        }
    }
}

/// Named feature values; serializes in column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureEcho {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

/// Validate a raw feature list.
///
/// The length is checked before the contents, so `["a", "b"]` reports a
/// length error rather than a type error.
pub fn validate(raw: &[RawFeature]) -> Result<Features, ValidationError> {
    if raw.len() != N_FEATURES {
        return Err(ValidationError::WrongLength {
            expected: N_FEATURES,
            actual: raw.len(),
        });
    }
    let mut values = [0.0; N_FEATURES];
    for (index, (slot, entry)) in values.iter_mut().zip(raw).enumerate() {
        *slot = entry.to_number(index)?;
    }
    Ok(Features(values))
}

/// Human-readable description of the expected input.
pub fn expected_input() -> String {
    format!("list of {N_FEATURES} numbers [{}]", FEATURE_NAMES.join(", "))
}
