//! Metrics for the duo-match client
//!
//! This module provides Prometheus metrics collection for matchmaking sessions
//! and their interaction with the realtime backend.

pub mod collector;

pub use collector::{BackendMetrics, MetricsCollector, SessionMetrics};

use anyhow::Result;
use prometheus::{Encoder, TextEncoder};

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics(collector: &MetricsCollector) -> Result<String> {
    let metric_families = collector.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Metrics are not valid UTF-8: {}", e))
}
