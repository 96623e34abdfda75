use serde::Serialize;
use tracing::instrument;

use crate::db::PgPool;
use crate::store::{EmbeddingStore, StoreError};
use crate::{Entity, EntityKind};

const ENTITY_COLUMNS: &str = "id, display_name, headline, description, skills, \
     experience_years, education_level, location, region, embedding, \
     embedding_updated_at, archived_at, updated_at";

/// Embedding coverage of one collection, for health reporting. Not part of
/// the hot recommendation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub collection: String,
    pub with_embedding: i64,
    pub without_embedding: i64,
}

/// Postgres-backed view of the entity collections. Read-only on the
/// recommendation path; the embedding writes below exist for the refresh
/// worker only.
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
    dimension: usize,
}

impl PgEntityStore {
    pub fn new(pool: PgPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    fn table(kind: EntityKind) -> String {
        format!("tm.{}", kind.collection())
    }

    fn map_row(kind: EntityKind, row: &tokio_postgres::Row) -> Entity {
        Entity {
            id: row.get("id"),
            kind,
            display_name: row.get("display_name"),
            headline: row.get("headline"),
            description: row.get("description"),
            skills: row
                .get::<_, Option<Vec<String>>>("skills")
                .unwrap_or_default(),
            experience_years: row.get("experience_years"),
            education_level: row.get("education_level"),
            location: row.get("location"),
            region: row.get("region"),
            embedding: row.get("embedding"),
            embedding_updated_at: row.get("embedding_updated_at"),
            archived_at: row.get("archived_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Entities whose embedding is absent, of a stale generation, or older
    /// than the last text edit. Feed for the refresh worker; oldest edits
    /// first so a backlog drains in a predictable order.
    #[instrument(skip(self))]
    pub async fn fetch_missing_embeddings(
        &self,
        kind: EntityKind,
        limit: i64,
    ) -> Result<Vec<Entity>, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ENTITY_COLUMNS} FROM {} \
             WHERE archived_at IS NULL \
               AND (embedding IS NULL \
                    OR cardinality(embedding) <> $1 \
                    OR embedding_updated_at IS NULL \
                    OR embedding_updated_at < updated_at) \
             ORDER BY updated_at ASC \
             LIMIT $2",
            Self::table(kind)
        );

        let rows = client
            .query(&query, &[&(self.dimension as i32), &limit])
            .await?;

        Ok(rows.iter().map(|row| Self::map_row(kind, row)).collect())
    }

    /// Replace the stored vector whole. Partial updates do not exist in
    /// this data model.
    #[instrument(skip(self, vector))]
    pub async fn store_embedding(
        &self,
        kind: EntityKind,
        id: &str,
        vector: &[f32],
    ) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "UPDATE {} SET embedding = $2, embedding_updated_at = NOW() WHERE id = $1",
            Self::table(kind)
        );

        let updated = client.execute(&query, &[&id, &vector]).await?;
        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    pub async fn embedding_coverage(&self, kind: EntityKind) -> Result<CoverageReport, StoreError> {
        Ok(CoverageReport {
            collection: kind.collection().to_string(),
            with_embedding: self.count_with_embedding(kind).await?,
            without_embedding: self.count_without_embedding(kind).await?,
        })
    }
}

impl EmbeddingStore for PgEntityStore {
    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ENTITY_COLUMNS} FROM {} WHERE id = $1",
            Self::table(kind)
        );

        let row = client.query_opt(&query, &[&id]).await?;
        Ok(row.map(|row| Self::map_row(kind, &row)))
    }

    async fn entities_with_embedding(
        &self,
        kind: EntityKind,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Entity>, StoreError> {
        let client = self.pool.get().await?;
        // Primary-key order keeps the snapshot stable; it is the tie-break
        // order of the fallback ranking.
        let query = format!(
            "SELECT {ENTITY_COLUMNS} FROM {} \
             WHERE archived_at IS NULL \
               AND embedding IS NOT NULL \
               AND cardinality(embedding) = $1 \
               AND ($2::text IS NULL OR id <> $2) \
             ORDER BY id",
            Self::table(kind)
        );

        let rows = client
            .query(&query, &[&(self.dimension as i32), &exclude_id])
            .await?;

        Ok(rows.iter().map(|row| Self::map_row(kind, row)).collect())
    }

    async fn count_with_embedding(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT COUNT(*) FROM {} \
             WHERE archived_at IS NULL \
               AND embedding IS NOT NULL \
               AND cardinality(embedding) = $1",
            Self::table(kind)
        );

        let row = client.query_one(&query, &[&(self.dimension as i32)]).await?;
        Ok(row.get(0))
    }

    async fn count_without_embedding(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT COUNT(*) FROM {} \
             WHERE archived_at IS NULL \
               AND (embedding IS NULL OR cardinality(embedding) <> $1)",
            Self::table(kind)
        );

        let row = client.query_one(&query, &[&(self.dimension as i32)]).await?;
        Ok(row.get(0))
    }
}
