//! Metrics infrastructure for the matching engine
//!
//! This module provides the Prometheus exporter initialization plus an
//! engine-local metric set with atomic counters. The engine records into
//! [`EngineMetrics`]; callers that want scraping also call [`init_metrics`].

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP server on the specified port that exposes metrics
/// at the `/metrics` endpoint.
///
/// # Arguments
///
/// * `port` - Port to expose metrics on
///
/// # Example
///
/// ```ignore
/// observability::metrics::init_metrics(9090)?;
/// // Metrics available at http://localhost:9090/metrics
/// ```
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_metrics();

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Register metric descriptions with the installed recorder
fn describe_metrics() {
    metrics::describe_counter!("engine_edges_created_total", "Target edges created");
    metrics::describe_counter!("engine_cycle_rejections_total", "Edges refused by the cycle check");
    metrics::describe_counter!("engine_auctions_ended_total", "Auctions closed");
    metrics::describe_gauge!("engine_active_auctions", "Auctions currently accepting proposals");
}

/// Simple atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Simple gauge for current values
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Histogram for tracking latencies (simple implementation)
/// For scrape-side aggregation, use the `metrics` crate exporter instead
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    pub fn record(&self, value_us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value_us, Ordering::Relaxed);

        // Update min
        let current_min = self.min.load(Ordering::Relaxed);
        if value_us < current_min {
            self.min.store(value_us, Ordering::Relaxed);
        }

        // Update max
        let current_max = self.max.load(Ordering::Relaxed);
        if value_us > current_max {
            self.max.store(value_us, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> HistogramStats {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);

        HistogramStats {
            count,
            sum_us: sum,
            avg_us: if count > 0 { sum / count } else { 0 },
            min_us: self.min.load(Ordering::Relaxed),
            max_us: self.max.load(Ordering::Relaxed),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub sum_us: u64,
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

/// Metrics for the matching engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub edges_created: Counter,
    pub edges_accepted: Counter,
    pub cycle_rejections: Counter,
    pub conflict_rejections: Counter,
    pub proposals_submitted: Counter,
    pub auctions_ended: Counter,
    pub listings_expired: Counter,
    pub propose_latency: Histogram,
    pub active_auctions: Gauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_edge_created(&self) {
        self.edges_created.increment();
    }

    pub fn record_edge_accepted(&self) {
        self.edges_accepted.increment();
    }

    pub fn record_cycle_rejection(&self) {
        self.cycle_rejections.increment();
    }

    pub fn record_conflict_rejection(&self) {
        self.conflict_rejections.increment();
    }

    pub fn record_proposal_submitted(&self) {
        self.proposals_submitted.increment();
    }

    pub fn record_auction_ended(&self) {
        self.auctions_ended.increment();
    }

    pub fn record_listing_expired(&self) {
        self.listings_expired.increment();
    }

    pub fn record_propose_latency(&self, duration: Duration) {
        self.propose_latency.record(duration.as_micros() as u64);
    }

    pub fn set_active_auctions(&self, count: u64) {
        self.active_auctions.set(count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency_stats = self.propose_latency.get_stats();

        MetricsSnapshot {
            edges_created: self.edges_created.get(),
            edges_accepted: self.edges_accepted.get(),
            cycle_rejections: self.cycle_rejections.get(),
            conflict_rejections: self.conflict_rejections.get(),
            proposals_submitted: self.proposals_submitted.get(),
            auctions_ended: self.auctions_ended.get(),
            listings_expired: self.listings_expired.get(),
            propose_latency_avg_us: latency_stats.avg_us,
            propose_latency_max_us: latency_stats.max_us,
            active_auctions: self.active_auctions.get(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub edges_created: u64,
    pub edges_accepted: u64,
    pub cycle_rejections: u64,
    pub conflict_rejections: u64,
    pub proposals_submitted: u64,
    pub auctions_ended: u64,
    pub listings_expired: u64,
    pub propose_latency_avg_us: u64,
    pub propose_latency_max_us: u64,
    pub active_auctions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_roundtrip() {
        let metrics = EngineMetrics::new();
        metrics.record_edge_created();
        metrics.record_edge_created();
        metrics.record_cycle_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.edges_created, 2);
        assert_eq!(snapshot.cycle_rejections, 1);
        assert_eq!(snapshot.edges_accepted, 0);
    }

    #[test]
    fn test_histogram_stats() {
        let h = Histogram::new();
        h.record(10);
        h.record(30);

        let stats = h.get_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_us, 20);
        assert_eq!(stats.min_us, 10);
        assert_eq!(stats.max_us, 30);
    }
}
