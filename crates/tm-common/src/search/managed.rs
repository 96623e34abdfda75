#![allow(async_fn_in_trait)]

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use super::SimilarityResult;
use crate::EntityKind;
use crate::config::RecoConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum IndexClientError {
    #[error("no index endpoint configured")]
    Disabled,
    #[error("index request failed: {0}")]
    Transport(String),
    #[error("index response malformed: {0}")]
    Malformed(String),
}

/// Transport seam to the ANN index provider. Production uses
/// `HttpIndexClient`; tests substitute a scripted double.
pub trait IndexClient {
    async fn query(
        &self,
        index_name: &str,
        payload: &Value,
    ) -> Result<Vec<IndexHit>, IndexClientError>;
}

/// Outcome of a managed-index probe. `Unavailable` is a routing signal,
/// not an error: it tells the orchestrator to take the fallback path and
/// is never surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedSearchOutcome {
    Hits(Vec<SimilarityResult>),
    Unavailable,
}

type QueryShape = fn(&[f32], usize, usize) -> Value;

/// Known parameter shapes of the provider's vector-search API, in probe
/// order. The contract is not stable across index versions, so the search
/// tries each shape until one answers with hits.
const QUERY_SHAPES: &[(&str, QueryShape)] = &[
    ("vectorSearch", vector_search_payload),
    ("knnVector", knn_vector_payload),
    ("vector", bare_vector_payload),
];

fn vector_search_payload(vector: &[f32], k: usize, num_candidates: usize) -> Value {
    json!({
        "vectorSearch": {
            "queryVector": vector,
            "limit": k,
            "numCandidates": num_candidates,
        }
    })
}

fn knn_vector_payload(vector: &[f32], k: usize, _num_candidates: usize) -> Value {
    json!({
        "knnVector": {
            "vector": vector,
            "k": k,
        }
    })
}

fn bare_vector_payload(vector: &[f32], k: usize, num_candidates: usize) -> Value {
    json!({
        "vector": vector,
        "k": k,
        "numCandidates": num_candidates,
    })
}

/// Probes the provider-side ANN index with each known query shape and
/// stops at the first non-empty result set. A shape that errors or comes
/// back empty just means "try the next one"; index provisioning is
/// environment-dependent, so exhausting all shapes is an expected outcome.
/// This is a capability probe: one pass, no retries, no backoff.
pub struct ManagedIndexSearch<'a, C> {
    client: &'a C,
    config: &'a RecoConfig,
}

impl<'a, C: IndexClient> ManagedIndexSearch<'a, C> {
    pub fn new(client: &'a C, config: &'a RecoConfig) -> Self {
        Self { client, config }
    }

    pub async fn search(
        &self,
        kind: EntityKind,
        query_vector: &[f32],
        k: usize,
        num_candidates: usize,
    ) -> ManagedSearchOutcome {
        let index_name = self.config.index_name(kind);

        for (shape, build_payload) in QUERY_SHAPES {
            let payload = build_payload(query_vector, k, num_candidates);

            match self.client.query(&index_name, &payload).await {
                Ok(hits) if !hits.is_empty() => {
                    debug!(index = %index_name, shape, hits = hits.len(), "managed index answered");
                    return ManagedSearchOutcome::Hits(
                        hits.into_iter()
                            .map(|hit| SimilarityResult {
                                entity_id: hit.id,
                                score: hit.score.clamp(0.0, 1.0),
                            })
                            .collect(),
                    );
                }
                Ok(_) => {
                    debug!(index = %index_name, shape, "query shape returned no hits");
                }
                Err(err) => {
                    debug!(index = %index_name, shape, error = %err, "query shape failed");
                }
            }
        }

        debug!(index = %index_name, "managed index unavailable");
        ManagedSearchOutcome::Unavailable
    }
}

/// HTTP implementation against the index provider's query endpoint.
/// Built without an endpoint it reports `Disabled` on every call, which
/// the probe treats like any other unavailable shape.
pub struct HttpIndexClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpIndexClient {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, IndexClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| IndexClientError::Transport(err.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &RecoConfig) -> Result<Self, IndexClientError> {
        Self::new(
            config.index_endpoint.clone(),
            Duration::from_millis(config.index_timeout_ms),
        )
    }
}

impl IndexClient for HttpIndexClient {
    async fn query(
        &self,
        index_name: &str,
        payload: &Value,
    ) -> Result<Vec<IndexHit>, IndexClientError> {
        let endpoint = self.endpoint.as_deref().ok_or(IndexClientError::Disabled)?;
        let url = format!("{endpoint}/indexes/{index_name}/query");

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|err| IndexClientError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| IndexClientError::Transport(err.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|err| IndexClientError::Transport(err.to_string()))?;

        parse_hits(&body)
    }
}

fn parse_hits(body: &Value) -> Result<Vec<IndexHit>, IndexClientError> {
    let items = body
        .get("hits")
        .or_else(|| body.get("results"))
        .and_then(Value::as_array)
        .ok_or_else(|| IndexClientError::Malformed("missing hits array".into()))?;

    items
        .iter()
        .map(|item| {
            let id = item
                .get("id")
                .or_else(|| item.get("_id"))
                .and_then(Value::as_str)
                .ok_or_else(|| IndexClientError::Malformed("hit without id".into()))?;
            let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);

            Ok(IndexHit {
                id: id.to_string(),
                score,
            })
        })
        .collect()
}
