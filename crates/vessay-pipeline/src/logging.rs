//! Structured step logging utilities.
//!
//! Provides consistent, structured logging for pipeline steps with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use crate::orchestrator::StepName;

/// Step logger for structured logging with consistent formatting.
///
/// Every line carries the run's video id and the step name.
#[derive(Debug, Clone)]
pub struct StepLogger {
    video_id: String,
    step: StepName,
}

impl StepLogger {
    pub fn new(video_id: impl Into<String>, step: StepName) -> Self {
        Self {
            video_id: video_id.into(),
            step,
        }
    }

    /// Log the start of a step.
    pub fn log_start(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            step = %self.step,
            "Step started: {}", message
        );
    }

    /// Log a progress update during a step.
    pub fn log_progress(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            step = %self.step,
            "Step progress: {}", message
        );
    }

    /// Log that a step was skipped because its artifact exists.
    pub fn log_skip(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            step = %self.step,
            "Step skipped: {}", message
        );
    }

    /// Log a recoverable problem during a step.
    pub fn log_warning(&self, message: &str) {
        warn!(
            video_id = %self.video_id,
            step = %self.step,
            "Step warning: {}", message
        );
    }

    /// Log a step failure.
    pub fn log_error(&self, message: &str) {
        error!(
            video_id = %self.video_id,
            step = %self.step,
            "Step failed: {}", message
        );
    }

    /// Log the completion of a step.
    pub fn log_completion(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            step = %self.step,
            "Step completed: {}", message
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn step(&self) -> StepName {
        self.step
    }

    /// Create a tracing span for this step.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "step",
            video_id = %self.video_id,
            step = %self.step
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_logger_creation() {
        let logger = StepLogger::new("dQw4w9WgXcQ", StepName::ExtractFrames);

        assert_eq!(logger.video_id(), "dQw4w9WgXcQ");
        assert_eq!(logger.step(), StepName::ExtractFrames);
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = StepLogger::new("dQw4w9WgXcQ", StepName::Essay);
        let _guard = logger.create_span().entered();
        logger.log_start("generating");
        logger.log_progress("streaming");
        logger.log_warning("slow");
        logger.log_completion("done");
    }
}
