use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::RecoConfig;
use crate::scoring::{WeightError, WeightSet, WeightedScorer};
use crate::search::{
    IndexClient, ManagedIndexSearch, ManagedSearchOutcome, SimilarityResult, fallback,
};
use crate::store::{self, EmbeddingStore, StoreError};
use crate::{Entity, EntityKind};

/// One recommendation request as supplied by the request layer.
/// Stateless; nothing here is persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationQuery {
    pub entity_id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub weights: Option<WeightSet>,
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("entity not found: {kind}/{id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("entity has no valid embedding: {kind}/{id}")]
    MissingEmbedding { kind: EntityKind, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Weights(#[from] WeightError),
}

/// A similarity hit re-ranked by the weighted multi-factor scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedRecommendation {
    pub entity_id: String,
    pub similarity: f64,
    pub composite: f64,
}

/// Per-request pipeline over the store and index seams:
/// Load -> TryManaged -> Fallback -> Filter -> Return. Each stage runs at
/// most once; no stage retries. Dropping the returned future abandons the
/// whole request, so partial results are never observable.
pub struct Recommender<S, C> {
    store: S,
    index: C,
    config: RecoConfig,
}

impl<S: EmbeddingStore, C: IndexClient> Recommender<S, C> {
    pub fn new(store: S, index: C, config: RecoConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Nearest neighbors of the query entity, ranked best-first, at most
    /// `k` of them. An empty vec is a valid outcome, distinct from every
    /// error in `RecommendError`.
    #[instrument(skip(self), fields(kind = %query.kind, entity_id = %query.entity_id))]
    pub async fn recommend(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<SimilarityResult>, RecommendError> {
        let k = query.k.unwrap_or(self.config.default_k);
        let (_, vector) = self.load_query_vector(query).await?;

        let managed = ManagedIndexSearch::new(&self.index, &self.config);
        // Ask for one extra hit: the index may rank the query entity
        // itself first.
        let outcome = managed
            .search(query.kind, &vector, k + 1, self.config.num_candidates)
            .await;

        let mut results = match outcome {
            ManagedSearchOutcome::Hits(hits) => {
                let filtered: Vec<_> = hits
                    .into_iter()
                    .filter(|hit| hit.entity_id != query.entity_id)
                    .collect();
                if filtered.is_empty() {
                    self.fallback(query, &vector, k).await?
                } else {
                    filtered
                }
            }
            ManagedSearchOutcome::Unavailable => self.fallback(query, &vector, k).await?,
        };

        if let Some(min_score) = query.min_score {
            results.retain(|result| result.score >= min_score);
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    /// Vector recommendation followed by the weighted multi-factor
    /// re-rank. Requires `query.weights`; validation failures propagate
    /// before any entity is scored.
    #[instrument(skip(self), fields(kind = %query.kind, entity_id = %query.entity_id))]
    pub async fn recommend_weighted(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<WeightedRecommendation>, RecommendError> {
        let weights = query.weights.clone().unwrap_or_default();
        let scorer = WeightedScorer::from_config(&self.config);
        weights.validate(self.config.weight_sum_tolerance)?;

        let (target, _) = self.load_query_vector(query).await?;
        let neighbors = self.recommend(query).await?;

        let mut ranked = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let Some(entity) = self.store.get_by_id(query.kind, &neighbor.entity_id).await? else {
                // The snapshot raced a deletion; the hit is meaningless now.
                warn!(kind = %query.kind, entity_id = %neighbor.entity_id, "hit vanished from store");
                continue;
            };

            let composite = scorer.score(&entity, &target, &weights)?;
            ranked.push(WeightedRecommendation {
                entity_id: neighbor.entity_id,
                similarity: neighbor.score,
                composite,
            });
        }

        ranked.sort_by(|a, b| b.composite.partial_cmp(&a.composite).unwrap_or(Ordering::Equal));
        Ok(ranked)
    }

    async fn load_query_vector(
        &self,
        query: &RecommendationQuery,
    ) -> Result<(Entity, Vec<f32>), RecommendError> {
        let entity = self
            .store
            .get_by_id(query.kind, &query.entity_id)
            .await?
            .ok_or_else(|| RecommendError::NotFound {
                kind: query.kind,
                id: query.entity_id.clone(),
            })?;

        match store::valid_embedding(&entity, self.config.embedding_dimension) {
            Some(vector) => {
                let vector = vector.to_vec();
                Ok((entity, vector))
            }
            None => {
                debug!(kind = %query.kind, entity_id = %query.entity_id, "query entity lacks a usable embedding");
                Err(RecommendError::MissingEmbedding {
                    kind: query.kind,
                    id: query.entity_id.clone(),
                })
            }
        }
    }

    async fn fallback(
        &self,
        query: &RecommendationQuery,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityResult>, RecommendError> {
        Ok(fallback::search(&self.store, query.kind, vector, k, &query.entity_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;
    use crate::search::{IndexClientError, IndexHit};
    use crate::store::testing::MemoryStore;

    struct StubIndex {
        responses: Mutex<Vec<Result<Vec<IndexHit>, IndexClientError>>>,
    }

    impl StubIndex {
        fn unavailable() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
            }
        }

        fn answering(hits: Vec<IndexHit>) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(hits)]),
            }
        }
    }

    impl IndexClient for StubIndex {
        async fn query(
            &self,
            _index_name: &str,
            _payload: &Value,
        ) -> Result<Vec<IndexHit>, IndexClientError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(IndexClientError::Disabled);
            }
            responses.remove(0)
        }
    }

    fn dim3_config() -> RecoConfig {
        RecoConfig {
            embedding_dimension: 3,
            ..RecoConfig::default()
        }
    }

    fn candidate(id: &str, embedding: Option<Vec<f32>>) -> Entity {
        Entity {
            id: id.into(),
            kind: EntityKind::Candidates,
            embedding,
            ..Entity::default()
        }
    }

    fn query(id: &str, k: usize) -> RecommendationQuery {
        RecommendationQuery {
            entity_id: id.into(),
            kind: EntityKind::Candidates,
            k: Some(k),
            min_score: None,
            weights: None,
        }
    }

    fn five_candidate_store() -> MemoryStore {
        MemoryStore::new(vec![
            candidate("query", Some(vec![1.0, 0.0, 0.0])),
            candidate("twin", Some(vec![0.99, 0.01, 0.0])),
            candidate("near", Some(vec![0.7, 0.3, 0.0])),
            candidate("mid", Some(vec![0.2, 0.8, 0.0])),
            candidate("far", Some(vec![-0.9, 0.1, 0.0])),
        ])
    }

    #[tokio::test]
    async fn falls_back_to_brute_force_when_index_is_unavailable() {
        let recommender =
            Recommender::new(five_candidate_store(), StubIndex::unavailable(), dim3_config());

        let results = recommender.recommend(&query("query", 3)).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entity_id, "twin");
        assert_eq!(results[1].entity_id, "near");
        assert_eq!(results[2].entity_id, "mid");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn managed_hits_skip_the_brute_force_scan() {
        let index = StubIndex::answering(vec![
            IndexHit {
                id: "query".into(),
                score: 1.0,
            },
            IndexHit {
                id: "far".into(),
                score: 0.9,
            },
            IndexHit {
                id: "mid".into(),
                score: 0.8,
            },
        ]);
        let recommender = Recommender::new(five_candidate_store(), index, dim3_config());

        let results = recommender.recommend(&query("query", 2)).await.unwrap();

        // The index ranking wins as-is, minus the query entity itself,
        // even where the brute-force scan would disagree.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entity_id, "far");
        assert_eq!(results[1].entity_id, "mid");
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let recommender =
            Recommender::new(five_candidate_store(), StubIndex::unavailable(), dim3_config());

        let err = recommender.recommend(&query("ghost", 3)).await.unwrap_err();

        assert!(matches!(err, RecommendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn entity_without_embedding_fails_with_missing_embedding() {
        let store = MemoryStore::new(vec![
            candidate("query", None),
            candidate("other", Some(vec![1.0, 0.0, 0.0])),
        ]);
        let recommender = Recommender::new(store, StubIndex::unavailable(), dim3_config());

        let err = recommender.recommend(&query("query", 3)).await.unwrap_err();

        assert!(matches!(err, RecommendError::MissingEmbedding { .. }));
    }

    #[tokio::test]
    async fn wrong_dimension_query_embedding_counts_as_missing() {
        let store = MemoryStore::new(vec![candidate("query", Some(vec![1.0, 0.0]))]);
        let recommender = Recommender::new(store, StubIndex::unavailable(), dim3_config());

        let err = recommender.recommend(&query("query", 3)).await.unwrap_err();

        assert!(matches!(err, RecommendError::MissingEmbedding { .. }));
    }

    #[tokio::test]
    async fn min_score_threshold_drops_weak_matches() {
        let recommender =
            Recommender::new(five_candidate_store(), StubIndex::unavailable(), dim3_config());
        let mut q = query("query", 5);
        q.min_score = Some(0.6);

        let results = recommender.recommend(&q).await.unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.score >= 0.6));
        assert!(results.iter().all(|r| r.entity_id != "far"));
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_result_not_an_error() {
        let store = MemoryStore::new(vec![candidate("query", Some(vec![1.0, 0.0, 0.0]))]);
        let recommender = Recommender::new(store, StubIndex::unavailable(), dim3_config());

        let results = recommender.recommend(&query("query", 3)).await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn identical_requests_return_identical_rankings() {
        let recommender =
            Recommender::new(five_candidate_store(), StubIndex::unavailable(), dim3_config());

        let first = recommender.recommend(&query("query", 4)).await.unwrap();
        let second = recommender.recommend(&query("query", 4)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn weighted_rerank_orders_by_composite_score() {
        let mut store = five_candidate_store();
        for entity in &mut store.entities {
            entity.experience_years = Some(2.0);
            entity.skills = vec!["rust".into()];
        }
        // "far" is the vector outsider but the only skills+experience fit.
        store.entities[4].skills = vec!["rust".into(), "postgresql".into()];
        store.entities[4].experience_years = Some(7.0);
        store.entities[0].skills = vec!["rust".into(), "postgres".into()];
        store.entities[0].experience_years = Some(5.0);

        let recommender = Recommender::new(store, StubIndex::unavailable(), dim3_config());
        let mut q = query("query", 4);
        q.weights = Some(WeightSet::from([("skills", 0.5), ("experience", 0.5)]));

        let ranked = recommender.recommend_weighted(&q).await.unwrap();

        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].entity_id, "far");
        assert!((ranked[0].composite - 1.0).abs() < 1e-9);
        assert!(ranked.windows(2).all(|w| w[0].composite >= w[1].composite));
    }

    #[tokio::test]
    async fn weighted_rerank_rejects_invalid_weights_up_front() {
        let recommender =
            Recommender::new(five_candidate_store(), StubIndex::unavailable(), dim3_config());
        let mut q = query("query", 3);
        q.weights = Some(WeightSet::from([("skills", 0.9), ("experience", 0.2)]));

        let err = recommender.recommend_weighted(&q).await.unwrap_err();

        assert!(matches!(
            err,
            RecommendError::Weights(WeightError::InvalidSum { .. })
        ));
    }

    #[test]
    fn query_deserializes_with_optional_fields_absent() {
        let q: RecommendationQuery =
            serde_json::from_str(r#"{"entity_id":"c-1","kind":"candidates"}"#).unwrap();

        assert_eq!(q.entity_id, "c-1");
        assert_eq!(q.kind, EntityKind::Candidates);
        assert!(q.k.is_none());
        assert!(q.min_score.is_none());
        assert!(q.weights.is_none());
    }
}
