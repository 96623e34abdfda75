#![allow(async_fn_in_trait)]

use thiserror::Error;

use crate::{Entity, EntityKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Read side of the entity collections as seen by the recommendation path.
///
/// Implementations must treat the snapshot contract of
/// `entities_with_embedding` seriously: one pass, finite, fetch order
/// stable across identical store states (it is the tie-break order of the
/// fallback ranking). The count methods exist for health reporting and are
/// not called on the hot path.
pub trait EmbeddingStore {
    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError>;

    async fn entities_with_embedding(
        &self,
        kind: EntityKind,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Entity>, StoreError>;

    async fn count_with_embedding(&self, kind: EntityKind) -> Result<i64, StoreError>;

    async fn count_without_embedding(&self, kind: EntityKind) -> Result<i64, StoreError>;
}

/// The embedding field is only usable when it is present, non-empty and of
/// the configured dimension. Any other length counts as absent: a stored
/// vector from an older model generation must not rank against current ones.
pub fn valid_embedding(entity: &Entity, dimension: usize) -> Option<&[f32]> {
    entity
        .embedding
        .as_deref()
        .filter(|vector| !vector.is_empty() && vector.len() == dimension)
}

pub fn has_valid_embedding(entity: &Entity, dimension: usize) -> bool {
    valid_embedding(entity, dimension).is_some()
}
