//! # Prometheus Metrics
//!
//! Exposes operational metrics for the validator node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port, separate
//! from the RPC port so scraping never contends with consensus traffic.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Total number of blocks this node has finalized, leader or follower.
    pub blocks_produced_total: IntCounter,
    /// Current number of transactions waiting in the mempool.
    pub transactions_mempool: IntGauge,
    /// Total number of PBFT rounds this node has participated in.
    pub consensus_rounds_total: IntCounter,
    /// Number of currently connected peers.
    pub connected_peers: IntGauge,
    /// Height of the latest finalized block.
    pub block_height: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("meridian".into()), None)
            .expect("failed to create prometheus registry");

        let blocks_produced_total = IntCounter::new(
            "blocks_produced_total",
            "Total number of blocks finalized by this node",
        )
        .expect("metric creation");
        registry
            .register(Box::new(blocks_produced_total.clone()))
            .expect("metric registration");

        let transactions_mempool = IntGauge::new(
            "transactions_mempool",
            "Current number of pending transactions in the mempool",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_mempool.clone()))
            .expect("metric registration");

        let consensus_rounds_total = IntCounter::new(
            "consensus_rounds_total",
            "Total number of PBFT rounds this node has participated in",
        )
        .expect("metric creation");
        registry
            .register(Box::new(consensus_rounds_total.clone()))
            .expect("metric registration");

        let connected_peers =
            IntGauge::new("connected_peers", "Number of currently connected peers")
                .expect("metric creation");
        registry
            .register(Box::new(connected_peers.clone()))
            .expect("metric registration");

        let block_height = IntGauge::new("block_height", "Height of the latest finalized block")
            .expect("metric creation");
        registry
            .register(Box::new(block_height.clone()))
            .expect("metric registration");

        Self {
            registry,
            blocks_produced_total,
            transactions_mempool,
            consensus_rounds_total,
            connected_peers,
            block_height,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_encode_without_error() {
        let metrics = NodeMetrics::new();
        let text = metrics.encode().unwrap();
        assert!(text.contains("meridian_block_height"));
        assert!(text.contains("meridian_connected_peers"));
    }

    #[test]
    fn gauges_reflect_assigned_values() {
        let metrics = NodeMetrics::new();
        metrics.block_height.set(42);
        metrics.connected_peers.set(3);
        let text = metrics.encode().unwrap();
        assert!(text.contains("meridian_block_height 42"));
        assert!(text.contains("meridian_connected_peers 3"));
    }
}
