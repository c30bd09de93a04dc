//! Prometheus metrics for the leaderboard engine.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Engine metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Ingest
    /// Scores accepted into the engine.
    pub scores_ingested_total: IntCounter,
    /// Ingest attempts rejected by validation or persistence failure.
    pub ingest_failures_total: IntCounter,
    /// Ingest latency (WAL append + in-memory update).
    pub ingest_duration: Histogram,
    /// Bytes appended to the WAL.
    pub wal_bytes_total: IntCounter,

    // Queries
    /// Queries served, by kind (leaders, rank).
    pub queries_total: IntCounterVec,
    /// Query latency, by kind.
    pub query_duration: HistogramVec,

    // Expiration
    /// Window entries retired by the expiration worker.
    pub expirations_total: IntCounter,
    /// Tickets currently queued.
    pub expiration_queue_depth: IntGauge,

    // Snapshots
    /// Snapshots completed.
    pub snapshots_total: IntCounter,
    /// Snapshot attempts that failed.
    pub snapshot_failures_total: IntCounter,
    /// Snapshot duration (serialization + rename + WAL rotation).
    pub snapshot_duration: Histogram,

    /// Games with at least one score.
    pub games_active: IntGauge,
}

impl Metrics {
    /// Create a new metrics instance with all metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let scores_ingested_total =
            IntCounter::new("podium_scores_ingested_total", "Scores accepted")
                .expect("metric can be created");
        registry
            .register(Box::new(scores_ingested_total.clone()))
            .unwrap();

        let ingest_failures_total =
            IntCounter::new("podium_ingest_failures_total", "Rejected ingest attempts")
                .expect("metric can be created");
        registry
            .register(Box::new(ingest_failures_total.clone()))
            .unwrap();

        let ingest_duration = Histogram::with_opts(
            HistogramOpts::new("podium_ingest_duration_seconds", "Ingest latency").buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
            ]),
        )
        .expect("metric can be created");
        registry.register(Box::new(ingest_duration.clone())).unwrap();

        let wal_bytes_total = IntCounter::new("podium_wal_bytes_total", "Bytes appended to WAL")
            .expect("metric can be created");
        registry.register(Box::new(wal_bytes_total.clone())).unwrap();

        let queries_total = IntCounterVec::new(
            Opts::new("podium_queries_total", "Queries served"),
            &["kind"],
        )
        .expect("metric can be created");
        registry.register(Box::new(queries_total.clone())).unwrap();

        let query_duration = HistogramVec::new(
            HistogramOpts::new("podium_query_duration_seconds", "Query latency").buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
            ]),
            &["kind"],
        )
        .expect("metric can be created");
        registry.register(Box::new(query_duration.clone())).unwrap();

        let expirations_total = IntCounter::new(
            "podium_expirations_total",
            "Window entries retired by the expiration worker",
        )
        .expect("metric can be created");
        registry
            .register(Box::new(expirations_total.clone()))
            .unwrap();

        let expiration_queue_depth = IntGauge::new(
            "podium_expiration_queue_depth",
            "Expiration tickets currently queued",
        )
        .expect("metric can be created");
        registry
            .register(Box::new(expiration_queue_depth.clone()))
            .unwrap();

        let snapshots_total = IntCounter::new("podium_snapshots_total", "Snapshots completed")
            .expect("metric can be created");
        registry.register(Box::new(snapshots_total.clone())).unwrap();

        let snapshot_failures_total = IntCounter::new(
            "podium_snapshot_failures_total",
            "Snapshot attempts that failed",
        )
        .expect("metric can be created");
        registry
            .register(Box::new(snapshot_failures_total.clone()))
            .unwrap();

        let snapshot_duration = Histogram::with_opts(
            HistogramOpts::new("podium_snapshot_duration_seconds", "Snapshot duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )
        .expect("metric can be created");
        registry
            .register(Box::new(snapshot_duration.clone()))
            .unwrap();

        let games_active = IntGauge::new("podium_games_active", "Games with at least one score")
            .expect("metric can be created");
        registry.register(Box::new(games_active.clone())).unwrap();

        Self {
            registry,
            scores_ingested_total,
            ingest_failures_total,
            ingest_duration,
            wal_bytes_total,
            queries_total,
            query_duration,
            expirations_total,
            expiration_queue_depth,
            snapshots_total,
            snapshot_failures_total,
            snapshot_duration,
            games_active,
        }
    }

    /// Render all metrics in Prometheus text format.
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_gather() {
        let metrics = Metrics::new();
        metrics.scores_ingested_total.inc();
        metrics.queries_total.with_label_values(&["leaders"]).inc();
        metrics.games_active.set(3);

        let output = metrics.gather();
        assert!(output.contains("podium_scores_ingested_total 1"));
        assert!(output.contains("podium_games_active 3"));
    }
}
