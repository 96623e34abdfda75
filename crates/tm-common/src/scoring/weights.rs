use std::collections::BTreeMap;

use serde::Deserialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// Scoring factors with a sub-score implementation. A weight for any other
/// name is a configuration error, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Factor {
    Skills,
    Experience,
    Education,
    Location,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("weights must sum to 1.0 (tolerance {tolerance}); got {sum:.3}")]
    InvalidSum { sum: f64, tolerance: f64 },
    #[error("weight for '{factor}' must lie in [0, 1]; got {value}")]
    OutOfRange { factor: String, value: f64 },
    #[error("unknown scoring factor '{factor}'")]
    UnknownFactor { factor: String },
}

/// Caller-supplied factor weights, exactly as received from the request
/// layer. Weights are never auto-normalized: a set that does not sum to
/// 1.0 (within tolerance) expresses an intent we cannot guess, so it is
/// rejected with the computed sum.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct WeightSet(pub BTreeMap<String, f64>);

impl WeightSet {
    /// Validate and resolve the factor names. The returned pairs follow
    /// the `Factor` ordering so composite scores are reproducible.
    pub fn validate(&self, tolerance: f64) -> Result<Vec<(Factor, f64)>, WeightError> {
        let mut parsed = Vec::with_capacity(self.0.len());
        let mut sum = 0.0;

        for (name, value) in &self.0 {
            let factor: Factor = name.parse().map_err(|_| WeightError::UnknownFactor {
                factor: name.clone(),
            })?;

            if !(0.0..=1.0).contains(value) {
                return Err(WeightError::OutOfRange {
                    factor: name.clone(),
                    value: *value,
                });
            }

            sum += *value;
            parsed.push((factor, *value));
        }

        if (sum - 1.0).abs() > tolerance {
            return Err(WeightError::InvalidSum { sum, tolerance });
        }

        parsed.sort_by_key(|(factor, _)| *factor);
        Ok(parsed)
    }
}

impl<const N: usize> From<[(&str, f64); N]> for WeightSet {
    fn from(pairs: [(&str, f64); N]) -> Self {
        Self(pairs.into_iter().map(|(name, value)| (name.to_string(), value)).collect())
    }
}
