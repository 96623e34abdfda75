use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use tm_common::EntityKind;
use tm_common::config::RecoConfig;
use tm_common::db::{
    DbPoolError, MigrationError, PgEntityStore, create_pool_from_url_checked, run_migrations,
};
use tm_common::embedding::{EmbeddingClient, EmbeddingConfig, EmbeddingError};
use tm_common::logging;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum WorkerError {
    #[error("database error: {0}")]
    Db(#[from] DbPoolError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("embedding client error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Keeps entity embeddings current: entities whose descriptive text changed
/// (or never had a vector) are re-embedded batch by batch. Replace-whole-
/// vector semantics; a failed entity is simply picked up again on a later
/// pass.
#[derive(Debug, Clone, Parser)]
#[command(name = "tm-embed-worker", about = "Embedding refresh worker for the entity collections")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Seconds to sleep between passes
    #[arg(long, env = "TM_EMBED_POLL_INTERVAL_SECS", default_value_t = 30)]
    poll_interval_secs: u64,

    /// Entities re-embedded per collection per pass
    #[arg(long, env = "TM_EMBED_BATCH_SIZE", default_value_t = 16)]
    batch_size: i64,

    /// Run a single pass and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

struct PassStats {
    refreshed: u64,
    failed: u64,
}

async fn refresh_collection(
    store: &PgEntityStore,
    embedder: &EmbeddingClient,
    kind: EntityKind,
    batch_size: i64,
) -> PassStats {
    let mut stats = PassStats {
        refreshed: 0,
        failed: 0,
    };

    let batch = match store.fetch_missing_embeddings(kind, batch_size).await {
        Ok(batch) => batch,
        Err(err) => {
            warn!(kind = %kind, error = %err, "failed to fetch refresh batch");
            stats.failed += 1;
            return stats;
        }
    };

    if batch.is_empty() {
        return stats;
    }

    let texts: Vec<String> = batch.iter().map(|entity| entity.embedding_text()).collect();
    let vectors = match embedder.embed(&texts).await {
        Ok(vectors) => vectors,
        Err(err) => {
            warn!(kind = %kind, batch = batch.len(), error = %err, "embedding request failed");
            stats.failed += batch.len() as u64;
            return stats;
        }
    };

    for (entity, vector) in batch.iter().zip(vectors) {
        match store.store_embedding(kind, &entity.id, &vector).await {
            Ok(true) => stats.refreshed += 1,
            Ok(false) => {
                warn!(kind = %kind, entity_id = %entity.id, "entity vanished before embedding write");
                stats.failed += 1;
            }
            Err(err) => {
                warn!(kind = %kind, entity_id = %entity.id, error = %err, "failed to store embedding");
                stats.failed += 1;
            }
        }
    }

    stats
}

async fn run_pass(store: &PgEntityStore, embedder: &EmbeddingClient, batch_size: i64) {
    for kind in EntityKind::ALL {
        let stats = refresh_collection(store, embedder, kind, batch_size).await;

        if stats.refreshed > 0 || stats.failed > 0 {
            info!(
                kind = %kind,
                refreshed = stats.refreshed,
                failed = stats.failed,
                "refresh pass finished"
            );
        }
        tm_metrics::record_refresh_pass(kind.collection(), stats.refreshed, stats.failed);

        match store.embedding_coverage(kind).await {
            Ok(coverage) => tm_metrics::record_embedding_coverage(
                &coverage.collection,
                coverage.with_embedding,
                coverage.without_embedding,
            ),
            Err(err) => warn!(kind = %kind, error = %err, "failed to read embedding coverage"),
        }
    }
}

async fn run() -> Result<(), WorkerError> {
    dotenv().ok();
    logging::init("tm-embed-worker");
    tm_metrics::init_metrics("TM_METRICS_PORT", 9464);

    let cli = Cli::parse();
    let config = RecoConfig::from_env();
    let embedding_config = EmbeddingConfig::from_env();

    if embedding_config.dimensions != config.embedding_dimension {
        return Err(WorkerError::Config(format!(
            "embedding service dimension {} does not match configured dimension {}",
            embedding_config.dimensions, config.embedding_dimension
        )));
    }

    let pool = create_pool_from_url_checked(&cli.database_url).await?;
    run_migrations(&pool).await?;

    let store = PgEntityStore::new(pool, config.embedding_dimension);
    let embedder = EmbeddingClient::new(embedding_config)?;

    info!(
        poll_interval_secs = cli.poll_interval_secs,
        batch_size = cli.batch_size,
        dimension = config.embedding_dimension,
        "tm-embed-worker started"
    );

    loop {
        run_pass(&store, &embedder, cli.batch_size).await;

        if cli.once {
            return Ok(());
        }

        tokio::select! {
            _ = sleep(Duration::from_secs(cli.poll_interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "tm-embed-worker failed");
        std::process::exit(1);
    }
}
