pub mod fallback;
pub mod managed;

use serde::Serialize;

pub use managed::{
    HttpIndexClient, IndexClient, IndexClientError, IndexHit, ManagedIndexSearch,
    ManagedSearchOutcome,
};

/// One ranked neighbor. Scores live on the shared [0.0, 1.0] scale no
/// matter which search path produced them. Computed per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub entity_id: String,
    pub score: f64,
}
