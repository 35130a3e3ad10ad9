//! Client metrics.
//!
//! Counters for outbound requests, recorded through the `metrics` facade.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Total retry attempts after a rate-limit response, by operation.
    pub const RETRY_TOTAL: &str = "vessay_retry_total";
}

/// Record a backoff retry.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRY_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::RETRY_TOTAL.starts_with("vessay_"));
        record_retry("noop");
    }
}
