//! Prometheus metrics for the mock server.
//!
//! Tracks served requests, streaming activity and injected response delays.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Total number of requests served
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mokksy_requests_total",
        "Total number of requests served by the mock server",
        &["method", "outcome"]  // outcome: matched|unmatched
    )
    .unwrap();

    /// Chunks written by streaming responses
    pub static ref STREAM_CHUNKS_TOTAL: CounterVec = register_counter_vec!(
        "mokksy_stream_chunks_total",
        "Total number of chunks written by streaming responses",
        &["mode"]  // mode: sse|plain
    )
    .unwrap();

    /// Finished streams
    pub static ref STREAMS_TOTAL: CounterVec = register_counter_vec!(
        "mokksy_streams_total",
        "Total number of streaming responses by outcome",
        &["outcome"]  // outcome: completed|cancelled|failed
    )
    .unwrap();

    /// Configured response delay in milliseconds
    pub static ref RESPONSE_DELAY_MS: HistogramVec = register_histogram_vec!(
        "mokksy_response_delay_ms",
        "Histogram of configured response delays in milliseconds",
        &["kind"],  // kind: static|stream
        vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(method: &str, matched: bool) {
    let outcome = if matched { "matched" } else { "unmatched" };
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

pub fn record_stream_chunk(sse: bool) {
    let mode = if sse { "sse" } else { "plain" };
    STREAM_CHUNKS_TOTAL.with_label_values(&[mode]).inc();
}

pub fn record_stream_outcome(outcome: &str) {
    STREAMS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_response_delay(kind: &str, delay_ms: u64) {
    RESPONSE_DELAY_MS
        .with_label_values(&[kind])
        .observe(delay_ms as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("GET", true);
        record_request("POST", false);
        record_stream_chunk(true);
        record_stream_outcome("completed");
        record_response_delay("static", 100);

        let output = collect_metrics();

        assert!(output.contains("mokksy_requests_total"));
        assert!(output.contains("outcome=\"unmatched\""));
        assert!(output.contains("mokksy_stream_chunks_total"));
        assert!(output.contains("mokksy_streams_total"));
        assert!(output.contains("mokksy_response_delay_ms"));
    }
}
