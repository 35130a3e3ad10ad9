//! Resumable step sequencing.
//!
//! A run is a fixed sequence of steps. Each step's completion is recorded
//! only by the presence of its artifact, queried through [`ArtifactStore`].
//! Before a step runs, [`plan`] decides from artifact presence and the
//! force flag whether to skip it; the first failing step stops the run.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, Instrument};

use crate::artifacts::{ArtifactStore, RunDir};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StepLogger;
use crate::metrics;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepName {
    Transcript,
    SponsorFilter,
    Essay,
    Download,
    ExtractFrames,
    PlaceImages,
    Score,
}

impl StepName {
    /// Every step, in the order a full run executes them.
    pub const ALL: [StepName; 7] = [
        StepName::Transcript,
        StepName::SponsorFilter,
        StepName::Essay,
        StepName::Download,
        StepName::ExtractFrames,
        StepName::PlaceImages,
        StepName::Score,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Transcript => "transcript",
            StepName::SponsorFilter => "sponsor-filter",
            StepName::Essay => "essay",
            StepName::Download => "download",
            StepName::ExtractFrames => "extract-frames",
            StepName::PlaceImages => "place-images",
            StepName::Score => "score",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepName::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step: {}", s))
    }
}

/// Lifecycle of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Missing,
    Running,
    Done,
    Failed,
}

/// What the orchestrator does with a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Execute,
}

/// Transition table: a present artifact is skipped unless forced.
pub fn plan(artifact_exists: bool, force: bool) -> Decision {
    if artifact_exists && !force {
        Decision::Skip
    } else {
        Decision::Execute
    }
}

/// State a step starts in given artifact presence and the force flag.
pub fn initial_state(artifact_exists: bool, force: bool) -> StepState {
    match plan(artifact_exists, force) {
        Decision::Skip => StepState::Done,
        Decision::Execute => StepState::Missing,
    }
}

/// One unit of pipeline work producing one artifact.
///
/// Steps read their inputs from the run directory only, never from another
/// step's in-memory state.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> StepName;

    async fn execute(&self, run: &RunDir) -> PipelineResult<()>;
}

fn transition(step: StepName, from: StepState, to: StepState) {
    debug!(step = %step, from = ?from, to = ?to, "Step state transition");
}

/// How a step ended within a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped,
    Executed { duration: Duration },
}

/// Per-step outcomes of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(StepName, StepOutcome)>,
}

impl RunReport {
    pub fn executed(&self) -> Vec<StepName> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Executed { .. }))
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn skipped(&self) -> Vec<StepName> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Skipped))
            .map(|(s, _)| *s)
            .collect()
    }
}

/// Runs steps in order with skip, force and fail-fast semantics.
pub struct Orchestrator {
    store: Arc<dyn ArtifactStore>,
    force: bool,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store, force: false }
    }

    /// Re-execute every step even when its artifact exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run `steps` in order against one run directory.
    ///
    /// Returns at the first failure with [`PipelineError::StepFailed`]
    /// naming the step; later steps are not attempted.
    pub async fn run(&self, run: &RunDir, steps: &[Arc<dyn Step>]) -> PipelineResult<RunReport> {
        let mut report = RunReport::default();

        for (index, step) in steps.iter().enumerate() {
            let name = step.name();
            let logger = StepLogger::new(run.video_id().as_str(), name);
            let span = logger.create_span();

            let exists = self.store.exists(run, name).await;
            let state = initial_state(exists, self.force);
            match plan(exists, self.force) {
                Decision::Skip => {
                    logger.log_skip("artifact exists");
                    metrics::record_step(name, "skipped");
                    report.outcomes.push((name, StepOutcome::Skipped));
                }
                Decision::Execute => {
                    logger.log_start(&format!("step {}/{}", index + 1, steps.len()));
                    transition(name, state, StepState::Running);
                    let started = Instant::now();

                    let result = step.execute(run).instrument(span).await;
                    let result = match result {
                        Ok(()) if !self.store.exists(run, name).await => {
                            Err(PipelineError::ArtifactMissing(name))
                        }
                        other => other,
                    };

                    let duration = started.elapsed();
                    metrics::record_step_duration(name, duration.as_secs_f64());

                    if let Err(e) = result {
                        transition(name, StepState::Running, StepState::Failed);
                        logger.log_error(&e.to_string());
                        metrics::record_step(name, "failed");
                        return Err(match e {
                            e @ PipelineError::ArtifactMissing(_) => e,
                            e => PipelineError::step_failed(name, e),
                        });
                    }

                    transition(name, StepState::Running, StepState::Done);
                    logger.log_completion(&format!("{:.1}s", duration.as_secs_f64()));
                    metrics::record_step(name, "done");
                    report.outcomes.push((name, StepOutcome::Executed { duration }));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(plan(false, false), Decision::Execute);
        assert_eq!(plan(false, true), Decision::Execute);
        assert_eq!(plan(true, false), Decision::Skip);
        assert_eq!(plan(true, true), Decision::Execute);

        assert_eq!(initial_state(true, false), StepState::Done);
        assert_eq!(initial_state(true, true), StepState::Missing);
    }

    #[test]
    fn test_step_order_and_names() {
        let names: Vec<&str> = StepName::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "transcript",
                "sponsor-filter",
                "essay",
                "download",
                "extract-frames",
                "place-images",
                "score"
            ]
        );
        assert!(StepName::ALL.windows(2).all(|w| w[0] < w[1]));
        assert_eq!("place-images".parse::<StepName>().unwrap(), StepName::PlaceImages);
        assert!("frames".parse::<StepName>().is_err());
    }
}
