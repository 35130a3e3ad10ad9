//! Resumable video-to-essay pipeline.
//!
//! This crate provides:
//! - Transcript parsing, speaker naming and sponsor filtering
//! - Essay writing, image placement, figure annotation and scoring
//! - Frame selection over sampled video frames
//! - A run orchestrator that treats artifacts on disk as checkpoints

pub mod artifacts;
pub mod config;
pub mod error;
pub mod essay;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod placement;
pub mod scoring;
pub mod selection;
pub mod speakers;
pub mod sponsors;
pub mod steps;
pub mod transcript;

pub use artifacts::{ArtifactStore, FsArtifactStore, RunDir};
pub use config::{PipelineConfig, SelectionConfig};
pub use error::{PipelineError, PipelineResult};
pub use logging::StepLogger;
pub use orchestrator::{Orchestrator, RunReport, Step, StepName, StepOutcome, StepState};
pub use selection::{FrameSelector, SelectionReport};
pub use steps::{full_run, step_for, StepContext};
