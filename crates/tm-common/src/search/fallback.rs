use std::cmp::Ordering;

use tracing::warn;

use super::SimilarityResult;
use crate::EntityKind;
use crate::similarity::normalized_similarity;
use crate::store::{EmbeddingStore, StoreError};

/// Brute-force similarity over every stored vector in the collection.
///
/// O(n) comparisons plus an O(n log n) sort; the deliberate,
/// correctness-first path taken when no managed index answers. The sort is
/// stable, so equal scores keep the store's fetch order. That is the
/// tie-break policy, not an accident.
pub async fn search<S: EmbeddingStore>(
    store: &S,
    kind: EntityKind,
    query_vector: &[f32],
    k: usize,
    exclude_id: &str,
) -> Result<Vec<SimilarityResult>, StoreError> {
    let candidates = store.entities_with_embedding(kind, Some(exclude_id)).await?;

    let mut results = Vec::with_capacity(candidates.len());
    for entity in &candidates {
        let Some(embedding) = entity.embedding.as_deref() else {
            continue;
        };

        match normalized_similarity(query_vector, embedding) {
            Ok(score) => results.push(SimilarityResult {
                entity_id: entity.id.clone(),
                score: f64::from(score),
            }),
            Err(err) => {
                // One bad vector must not fail the whole scan.
                warn!(kind = %kind, entity_id = %entity.id, error = %err, "skipping candidate embedding");
            }
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(k);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entity;
    use crate::store::testing::MemoryStore;

    fn candidate(id: &str, embedding: Vec<f32>) -> Entity {
        Entity {
            id: id.into(),
            kind: EntityKind::Candidates,
            embedding: Some(embedding),
            ..Entity::default()
        }
    }

    #[tokio::test]
    async fn returns_top_k_sorted_by_descending_similarity() {
        let store = MemoryStore::new(vec![
            candidate("far", vec![-1.0, 0.0, 0.0]),
            candidate("close", vec![0.9, 0.1, 0.0]),
            candidate("mid", vec![0.3, 0.7, 0.0]),
            candidate("exact", vec![1.0, 0.0, 0.0]),
        ]);

        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 3, "query")
            .await
            .expect("store never fails");

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entity_id, "exact");
        assert_eq!(results[1].entity_id, "close");
        assert_eq!(results[2].entity_id, "mid");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn fewer_candidates_than_k_returns_all() {
        let store = MemoryStore::new(vec![
            candidate("a", vec![1.0, 0.0, 0.0]),
            candidate("b", vec![0.0, 1.0, 0.0]),
        ]);

        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 10, "query")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn query_entity_is_excluded_from_its_own_neighbors() {
        let store = MemoryStore::new(vec![
            candidate("self", vec![1.0, 0.0, 0.0]),
            candidate("other", vec![0.9, 0.1, 0.0]),
        ]);

        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 5, "self")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "other");
    }

    #[tokio::test]
    async fn mismatched_candidate_dimension_is_skipped_not_fatal() {
        let store = MemoryStore::new(vec![
            candidate("good", vec![0.5, 0.5, 0.0]),
            candidate("stale", vec![1.0, 0.0]),
            candidate("better", vec![1.0, 0.0, 0.0]),
        ]);

        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 5, "query")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entity_id, "better");
        assert_eq!(results[1].entity_id, "good");
    }

    #[tokio::test]
    async fn equal_scores_keep_fetch_order() {
        let store = MemoryStore::new(vec![
            candidate("first", vec![0.0, 1.0, 0.0]),
            candidate("second", vec![0.0, 0.0, 1.0]),
            candidate("third", vec![0.0, -1.0, 0.0]),
        ]);

        // All three are orthogonal or opposite on the y/z plane; the two
        // orthogonal ones tie at 0.5 and must stay in fetch order.
        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 3, "query")
            .await
            .unwrap();

        assert_eq!(results[0].entity_id, "first");
        assert_eq!(results[1].entity_id, "second");
        assert_eq!(results[2].entity_id, "third");
    }

    #[tokio::test]
    async fn archived_entities_never_surface() {
        let mut archived = candidate("archived", vec![1.0, 0.0, 0.0]);
        archived.archived_at = Some(chrono::Utc::now());

        let store = MemoryStore::new(vec![archived, candidate("live", vec![0.9, 0.1, 0.0])]);

        let results = search(&store, EntityKind::Candidates, &[1.0, 0.0, 0.0], 5, "query")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "live");
    }
}
