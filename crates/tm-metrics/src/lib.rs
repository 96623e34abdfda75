use std::env;
use std::sync::OnceLock;

use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Start the Prometheus exporter on `0.0.0.0:<port>`, resolving the port
/// from `port_env` with `default_port` as fallback. Idempotent: repeat
/// calls return the already-installed handle.
pub fn init_metrics(port_env: &str, default_port: u16) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    let port = env::var(port_env)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(default_port);

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install_recorder()
    {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            info!(metrics_port = port, "started prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
    }
}

/// Embedding coverage of one collection, as last observed by the refresh
/// worker.
pub fn record_embedding_coverage(collection: &str, with_embedding: i64, without_embedding: i64) {
    gauge!("tm_entities_with_embedding", "collection" => collection.to_string())
        .set(with_embedding as f64);
    gauge!("tm_entities_without_embedding", "collection" => collection.to_string())
        .set(without_embedding as f64);
}

/// Outcome counts of one refresh pass over a collection.
pub fn record_refresh_pass(collection: &str, refreshed: u64, failed: u64) {
    metrics::counter!("tm_embeddings_refreshed_total", "collection" => collection.to_string())
        .increment(refreshed);
    metrics::counter!("tm_embedding_refresh_failures_total", "collection" => collection.to_string())
        .increment(failed);
}
