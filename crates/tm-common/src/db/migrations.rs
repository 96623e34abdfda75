use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "entity collections: candidates, jobs, projects",
        sql: r#"
CREATE TABLE IF NOT EXISTS tm.candidates (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    headline TEXT,
    description TEXT,
    skills TEXT[] NOT NULL DEFAULT '{}',
    experience_years DOUBLE PRECISION,
    education_level TEXT,
    location TEXT,
    region TEXT,
    archived_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS tm.jobs (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    headline TEXT,
    description TEXT,
    skills TEXT[] NOT NULL DEFAULT '{}',
    experience_years DOUBLE PRECISION,
    education_level TEXT,
    location TEXT,
    region TEXT,
    archived_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS tm.projects (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    headline TEXT,
    description TEXT,
    skills TEXT[] NOT NULL DEFAULT '{}',
    experience_years DOUBLE PRECISION,
    education_level TEXT,
    location TEXT,
    region TEXT,
    archived_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#,
    },
    // The embedding columns land in their own migration: attaching or
    // refreshing a vector must never require touching unrelated fields.
    Migration {
        id: 2,
        description: "additive embedding columns + worker scan indexes",
        sql: r#"
ALTER TABLE tm.candidates ADD COLUMN IF NOT EXISTS embedding REAL[];
ALTER TABLE tm.candidates ADD COLUMN IF NOT EXISTS embedding_updated_at TIMESTAMPTZ;
ALTER TABLE tm.jobs ADD COLUMN IF NOT EXISTS embedding REAL[];
ALTER TABLE tm.jobs ADD COLUMN IF NOT EXISTS embedding_updated_at TIMESTAMPTZ;
ALTER TABLE tm.projects ADD COLUMN IF NOT EXISTS embedding REAL[];
ALTER TABLE tm.projects ADD COLUMN IF NOT EXISTS embedding_updated_at TIMESTAMPTZ;

CREATE INDEX IF NOT EXISTS idx_candidates_embedding_missing
    ON tm.candidates(updated_at) WHERE embedding IS NULL;
CREATE INDEX IF NOT EXISTS idx_jobs_embedding_missing
    ON tm.jobs(updated_at) WHERE embedding IS NULL;
CREATE INDEX IF NOT EXISTS idx_projects_embedding_missing
    ON tm.projects(updated_at) WHERE embedding IS NULL;
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS tm;
             CREATE TABLE IF NOT EXISTS tm.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM tm.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO tm.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}
