use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use thiserror::Error;
use tm_common::EntityKind;
use tm_common::config::RecoConfig;
use tm_common::db::{DbPoolError, PgEntityStore, create_pool_from_url_checked};
use tm_common::logging;
use tm_common::recommend::{RecommendError, RecommendationQuery, Recommender};
use tm_common::scoring::WeightSet;
use tm_common::search::{HttpIndexClient, IndexClientError};
use tm_common::store::StoreError;
use tracing::error;

/// Operational CLI: run one recommendation request against the live store
/// (through the same pipeline the service uses) or report embedding
/// coverage. Smoke-testing and debugging tool, not a request layer.
#[derive(Debug, Parser)]
#[command(name = "tm-recommender", about = "Run recommendation queries from the command line")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Nearest neighbors for one entity
    Recommend {
        /// Collection of the query entity: candidates | jobs | projects
        #[arg(long)]
        kind: String,

        /// Id of the query entity
        #[arg(long)]
        id: String,

        /// Number of results (defaults to the configured k)
        #[arg(long)]
        k: Option<usize>,

        /// Drop results scoring below this threshold
        #[arg(long)]
        min_score: Option<f64>,

        /// JSON object of factor weights, e.g. '{"skills":0.6,"location":0.4}'
        #[arg(long)]
        weights: Option<String>,
    },
    /// Embedding coverage per collection
    Coverage {
        /// Restrict to one collection
        #[arg(long)]
        kind: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid collection '{0}' (expected candidates | jobs | projects)")]
    UnknownKind(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] DbPoolError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] IndexClientError),
    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

fn parse_kind(raw: &str) -> Result<EntityKind, CliError> {
    raw.parse()
        .map_err(|_| CliError::UnknownKind(raw.to_string()))
}

async fn run() -> Result<(), CliError> {
    dotenv().ok();
    logging::init("tm-recommender");

    let cli = Cli::parse();
    let config = RecoConfig::from_env();
    let pool = create_pool_from_url_checked(&cli.database_url).await?;
    let store = PgEntityStore::new(pool, config.embedding_dimension);

    match cli.command {
        Command::Recommend {
            kind,
            id,
            k,
            min_score,
            weights,
        } => {
            let weights: Option<WeightSet> = weights
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?;
            let query = RecommendationQuery {
                entity_id: id,
                kind: parse_kind(&kind)?,
                k,
                min_score,
                weights,
            };

            let index = HttpIndexClient::from_config(&config)?;
            let recommender = Recommender::new(store, index, config);

            let output = if query.weights.is_some() {
                let ranked = recommender.recommend_weighted(&query).await?;
                serde_json::to_string_pretty(&ranked)?
            } else {
                let results = recommender.recommend(&query).await?;
                serde_json::to_string_pretty(&results)?
            };
            println!("{output}");
        }
        Command::Coverage { kind } => {
            let kinds = match kind.as_deref() {
                Some(raw) => vec![parse_kind(raw)?],
                None => EntityKind::ALL.to_vec(),
            };

            let mut reports = Vec::with_capacity(kinds.len());
            for kind in kinds {
                reports.push(store.embedding_coverage(kind).await?);
            }
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "tm-recommender failed");
        std::process::exit(1);
    }
}
