use crate::EntityKind;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;
pub const DEFAULT_K: usize = 5;
pub const DEFAULT_NUM_CANDIDATES: usize = 100;
pub const DEFAULT_WEIGHT_SUM_TOLERANCE: f64 = 0.01;
pub const DEFAULT_INDEX_NAME_TEMPLATE: &str = "{collection}_vector_index";
pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 5_000;

/// Deployment-wide constants of the recommendation core. The embedding
/// dimension is configuration, never a literal in matching logic: every
/// dimension check in the pipeline reads it from here.
#[derive(Debug, Clone)]
pub struct RecoConfig {
    pub embedding_dimension: usize,
    pub default_k: usize,
    /// ANN candidate pool requested from the managed index per query.
    pub num_candidates: usize,
    pub index_name_template: String,
    pub weight_sum_tolerance: f64,
    /// Base URL of the managed index provider. None means no index is
    /// provisioned in this environment; every search falls back.
    pub index_endpoint: Option<String>,
    pub index_timeout_ms: u64,
}

impl Default for RecoConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            default_k: DEFAULT_K,
            num_candidates: DEFAULT_NUM_CANDIDATES,
            index_name_template: DEFAULT_INDEX_NAME_TEMPLATE.into(),
            weight_sum_tolerance: DEFAULT_WEIGHT_SUM_TOLERANCE,
            index_endpoint: None,
            index_timeout_ms: DEFAULT_INDEX_TIMEOUT_MS,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}

impl RecoConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            embedding_dimension: env_parsed("TM_EMBEDDING_DIMENSION")
                .filter(|dim| *dim > 0)
                .unwrap_or(defaults.embedding_dimension),
            default_k: env_parsed("TM_DEFAULT_K")
                .filter(|k| *k > 0)
                .unwrap_or(defaults.default_k),
            num_candidates: env_parsed("TM_NUM_CANDIDATES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.num_candidates),
            index_name_template: std::env::var("TM_INDEX_NAME_TEMPLATE")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.index_name_template),
            weight_sum_tolerance: env_parsed("TM_WEIGHT_SUM_TOLERANCE")
                .filter(|tol: &f64| *tol >= 0.0)
                .unwrap_or(defaults.weight_sum_tolerance),
            index_endpoint: std::env::var("TM_INDEX_ENDPOINT")
                .ok()
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            index_timeout_ms: env_parsed("TM_INDEX_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.index_timeout_ms),
        }
    }

    pub fn index_name(&self, kind: EntityKind) -> String {
        self.index_name_template.replace("{collection}", kind.collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_constants() {
        let config = RecoConfig::default();

        assert_eq!(config.embedding_dimension, 3072);
        assert_eq!(config.default_k, 5);
        assert_eq!(config.num_candidates, 100);
        assert_eq!(config.weight_sum_tolerance, 0.01);
        assert!(config.index_endpoint.is_none());
    }

    #[test]
    fn index_name_follows_collection_template() {
        let config = RecoConfig::default();

        assert_eq!(config.index_name(EntityKind::Candidates), "candidates_vector_index");
        assert_eq!(config.index_name(EntityKind::Jobs), "jobs_vector_index");
        assert_eq!(config.index_name(EntityKind::Projects), "projects_vector_index");
    }

    #[test]
    fn custom_template_is_respected() {
        let config = RecoConfig {
            index_name_template: "ann-{collection}".into(),
            ..RecoConfig::default()
        };

        assert_eq!(config.index_name(EntityKind::Jobs), "ann-jobs");
    }
}
