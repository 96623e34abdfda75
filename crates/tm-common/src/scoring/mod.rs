pub mod factors;
pub mod weights;

pub use weights::{Factor, WeightError, WeightSet};

use crate::Entity;
use crate::config::RecoConfig;

/// Combines the per-factor sub-scores into one composite ranking score
/// using caller-supplied weights. Pure and deterministic: identical
/// entities, target and weights always produce the same composite.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    tolerance: f64,
}

impl WeightedScorer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &RecoConfig) -> Self {
        Self::new(config.weight_sum_tolerance)
    }

    /// Composite score of `entity` against `target` in [0.0, 1.0];
    /// higher is better. Weights are validated first and rejected whole
    /// on any violation.
    pub fn score(
        &self,
        entity: &Entity,
        target: &Entity,
        weights: &WeightSet,
    ) -> Result<f64, WeightError> {
        let parsed = weights.validate(self.tolerance)?;

        let composite = parsed
            .iter()
            .map(|(factor, weight)| weight * self.subscore(*factor, entity, target))
            .sum::<f64>();

        Ok(composite.clamp(0.0, 1.0))
    }

    fn subscore(&self, factor: Factor, entity: &Entity, target: &Entity) -> f64 {
        match factor {
            Factor::Skills => factors::skills_overlap(&entity.skills, &target.skills),
            Factor::Experience => {
                factors::experience_proximity(entity.experience_years, target.experience_years)
            }
            Factor::Education => factors::education_match(
                entity.education_level.as_deref(),
                target.education_level.as_deref(),
            ),
            Factor::Location => factors::location_match(
                entity.location.as_deref(),
                entity.region.as_deref(),
                target.location.as_deref(),
                target.region.as_deref(),
            ),
        }
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WEIGHT_SUM_TOLERANCE)
    }
}
