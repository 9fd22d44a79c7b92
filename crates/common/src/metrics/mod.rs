//! Metrics and observability utilities
//!
//! Prometheus metric descriptions and recording helpers, all under the
//! `bookspace_` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all BookSpace metrics
pub const METRICS_PREFIX: &str = "bookspace";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for enrichment calls; bounded by the enrichment timeout
pub const ENRICHMENT_BUCKETS: &[f64] = &[
    0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_enrichment_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Blob storage and face detection calls made while enriching books"
    );

    describe_histogram!(
        format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Latency of successful enrichment calls in seconds"
    );

    describe_counter!(
        format!("{}_enrichment_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Enrichment calls that failed or timed out"
    );

    describe_counter!(
        format!("{}_unit_of_work_commits_total", METRICS_PREFIX),
        Unit::Count,
        "Unit of work commits by outcome"
    );

    describe_counter!(
        format!("{}_cover_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Cover images stored"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one enrichment call (`service` is `blob_storage` or `face_detection`)
pub fn record_enrichment(service: &'static str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_enrichment_requests_total", METRICS_PREFIX),
        "service" => service,
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
            "service" => service
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_enrichment_failures_total", METRICS_PREFIX),
            "service" => service
        )
        .increment(1);
    }
}

/// Record the outcome of a unit of work commit
pub fn record_commit(success: bool) {
    counter!(
        format!("{}_unit_of_work_commits_total", METRICS_PREFIX),
        "status" => if success { "committed" } else { "rolled_back" }
    )
    .increment(1);
}

pub fn record_cover_upload() {
    counter!(format!("{}_cover_uploads_total", METRICS_PREFIX)).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, ENRICHMENT_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op
        let metrics = RequestMetrics::start("GET", "/v1/books");
        metrics.finish(200);
        record_enrichment("blob_storage", 0.01, true);
        record_enrichment("face_detection", 0.5, false);
        record_commit(false);
        record_cover_upload();
    }
}
