use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

use crate::config::DEFAULT_EMBEDDING_DIMENSION;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding response malformed: {0}")]
    Malformed(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// Connection settings for the external embedding service. The service is
/// opaque to this core: it turns text into a fixed-length vector, and
/// nothing here depends on how.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8089/v1/embeddings".into(),
            api_key: None,
            model: "text-embedding-3-large".into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSION,
            timeout_ms: 30_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            endpoint: std::env::var("TM_EMBEDDING_ENDPOINT")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.endpoint),
            api_key: std::env::var("TM_EMBEDDING_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            model: std::env::var("TM_EMBEDDING_MODEL")
                .ok()
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(defaults.model),
            dimensions: std::env::var("TM_EMBEDDING_DIMENSION")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .filter(|dim| *dim > 0)
                .unwrap_or(defaults.dimensions),
            timeout_ms: std::env::var("TM_EMBEDDING_TIMEOUT_MS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.timeout_ms),
        }
    }
}

/// Client for the embedding service. Vectors of the wrong dimension are
/// rejected here so they can never reach the store.
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = json!({
            "model": self.config.model,
            "input": texts,
            "dimensions": self.config.dimensions,
        });

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response: Value = request.send().await?.error_for_status()?.json().await?;
        let vectors = parse_embedding_response(&response)?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.config.dimensions {
                return Err(EmbeddingError::Dimension {
                    expected: self.config.dimensions,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

/// The provider answers `data[].embedding` with an optional `index` per
/// item; items are re-ordered by that index before being returned.
fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::Malformed("missing data array".into()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(fallback_index);
        let values = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| EmbeddingError::Malformed("item missing embedding array".into()))?;

        let mut vector = Vec::with_capacity(values.len());
        for value in values {
            let number = value
                .as_f64()
                .ok_or_else(|| EmbeddingError::Malformed("embedding value not numeric".into()))?;
            vector.push(number as f32);
        }
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embeddings_in_index_order() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [2.0, 3.0] },
                { "index": 0, "embedding": [0.5, 1.5] }
            ]
        });

        let parsed = parse_embedding_response(&json).expect("parse failed");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], vec![0.5, 1.5]);
        assert_eq!(parsed[1], vec![2.0, 3.0]);
    }

    #[test]
    fn rejects_bodies_without_data() {
        let json = json!({ "error": "rate limited" });

        assert!(matches!(
            parse_embedding_response(&json),
            Err(EmbeddingError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_embedding_values() {
        let json = json!({ "data": [{ "embedding": [1.0, "oops"] }] });

        assert!(matches!(
            parse_embedding_response(&json),
            Err(EmbeddingError::Malformed(_))
        ));
    }
}
