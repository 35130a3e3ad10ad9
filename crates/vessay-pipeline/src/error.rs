//! Pipeline error types.

use thiserror::Error;

use crate::orchestrator::StepName;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("Unusable model output: {0}")]
    InvalidOutput(String),

    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: StepName,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Step {0} finished without writing its artifact")]
    ArtifactMissing(StepName),

    #[error("Media error: {0}")]
    Media(#[from] vessay_media::MediaError),

    #[error("Client error: {0}")]
    Client(#[from] vessay_client::ClientError),

    #[error("Invalid video reference: {0}")]
    VideoId(#[from] vessay_models::VideoIdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_precondition(msg: impl Into<String>) -> Self {
        Self::MissingPrecondition(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transcript_unavailable(msg: impl Into<String>) -> Self {
        Self::TranscriptUnavailable(msg.into())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }

    pub fn step_failed(step: StepName, source: PipelineError) -> Self {
        Self::StepFailed {
            step,
            source: Box::new(source),
        }
    }

    /// The step a failure is attributed to, if any.
    pub fn failed_step(&self) -> Option<StepName> {
        match self {
            PipelineError::StepFailed { step, .. } => Some(*step),
            PipelineError::ArtifactMissing(step) => Some(*step),
            _ => None,
        }
    }

    /// Whether the failure was caused by an upstream step not having run.
    pub fn is_missing_precondition(&self) -> bool {
        match self {
            PipelineError::MissingPrecondition(_) => true,
            PipelineError::StepFailed { source, .. } => source.is_missing_precondition(),
            _ => false,
        }
    }
}
