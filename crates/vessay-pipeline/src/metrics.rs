//! Pipeline metrics collection.
//!
//! Provides standardized metrics for monitoring pipeline runs:
//! - Step outcome counters
//! - Step duration histograms
//! - Frame counts per selection stage
//!
//! No exporter is installed by the binary; the facade drops samples until a
//! recorder is attached.

use metrics::{counter, histogram};

use crate::orchestrator::StepName;

/// Metric name constants for consistency.
pub mod names {
    /// Step outcomes by step and status (`done`, `skipped`, `failed`).
    pub const STEP_TOTAL: &str = "vessay_step_total";

    /// Step execution time in seconds by step.
    pub const STEP_DURATION_SECONDS: &str = "vessay_step_duration_seconds";

    /// Frames surviving each selection stage.
    pub const FRAMES_TOTAL: &str = "vessay_frames_total";
}

/// Record a step outcome.
pub fn record_step(step: StepName, status: &'static str) {
    counter!(
        names::STEP_TOTAL,
        "step" => step.as_str(),
        "status" => status
    )
    .increment(1);
}

/// Record how long an executed step took.
pub fn record_step_duration(step: StepName, secs: f64) {
    histogram!(
        names::STEP_DURATION_SECONDS,
        "step" => step.as_str()
    )
    .record(secs);
}

/// Record the frame count after a selection stage (`sampled`, `kept`, ...).
pub fn record_frames(stage: &'static str, count: usize) {
    counter!(
        names::FRAMES_TOTAL,
        "stage" => stage
    )
    .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::STEP_TOTAL.starts_with("vessay_"));
        assert!(names::STEP_DURATION_SECONDS.ends_with("_seconds"));
        assert!(names::FRAMES_TOTAL.contains("frames"));
    }
}
