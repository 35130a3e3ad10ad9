use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use vessay_media::{write_atomic, write_json_atomic};

use super::StepContext;
use crate::artifacts::RunDir;
use crate::error::PipelineResult;
use crate::essay::EssayWriter;
use crate::orchestrator::{Step, StepName};
use crate::scoring::EssayScorer;
use crate::sponsors::SponsorFilter;

/// Detects sponsor reads; writes `transcript_clean.txt` then `sponsors.json`.
pub struct SponsorFilterStep {
    ctx: Arc<StepContext>,
}

impl SponsorFilterStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for SponsorFilterStep {
    fn name(&self) -> StepName {
        StepName::SponsorFilter
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        let transcript = run.read_required(&run.transcript(), StepName::Transcript).await?;
        let filter = SponsorFilter::new(self.ctx.llm()?, &self.ctx.config.fast_model);

        let output = filter.filter(&transcript).await?;
        write_atomic(run.transcript_clean(), &output.cleaned).await?;
        write_json_atomic(run.sponsors(), &output.ranges).await?;

        info!(
            ranges = output.ranges.len(),
            removed_chars = transcript.len().saturating_sub(output.cleaned.len()),
            "Sponsor filter saved"
        );
        Ok(())
    }
}

/// Writes `essay.md` from the preferred transcript.
pub struct EssayStep {
    ctx: Arc<StepContext>,
}

impl EssayStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for EssayStep {
    fn name(&self) -> StepName {
        StepName::Essay
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        let transcript = run.preferred_transcript().await?;
        let writer = EssayWriter::new(
            self.ctx.llm()?,
            &self.ctx.config.fast_model,
            &self.ctx.config.writer_model,
        );

        let essay = writer.write(&transcript).await?;
        write_atomic(run.essay(), &essay).await?;
        info!(words = essay.split_whitespace().count(), "Essay saved");
        Ok(())
    }
}

/// Scores `essay.md` against the transcript into `score.json`.
pub struct ScoreStep {
    ctx: Arc<StepContext>,
}

impl ScoreStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for ScoreStep {
    fn name(&self) -> StepName {
        StepName::Score
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        let transcript = run.preferred_transcript().await?;
        let essay = run.read_required(&run.essay(), StepName::Essay).await?;
        let scorer = EssayScorer::new(
            self.ctx.llm()?,
            &self.ctx.config.writer_model,
            self.ctx.config.score_concurrency,
        );

        let report = scorer.score(&transcript, &essay).await?;
        write_json_atomic(run.score(), &report).await?;
        info!(overall = report.overall, "Score saved");
        Ok(())
    }
}
