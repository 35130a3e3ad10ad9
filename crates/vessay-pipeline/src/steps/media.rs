use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::StepContext;
use crate::artifacts::RunDir;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::{Step, StepName};
use crate::placement::ImagePlacer;
use crate::selection::FrameSelector;
use crate::transcript::parse_transcript;

/// Downloads the source video as `video.<ext>`.
pub struct DownloadStep {
    ctx: Arc<StepContext>,
}

impl DownloadStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for DownloadStep {
    fn name(&self) -> StepName {
        StepName::Download
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        run.ensure().await?;
        self.ctx
            .ytdlp()
            .download_video(&run.video_id().watch_url(), run.root())
            .await?;
        Ok(())
    }
}

/// Samples, deduplicates and classifies frames into `frames/`.
pub struct ExtractFramesStep {
    ctx: Arc<StepContext>,
}

impl ExtractFramesStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for ExtractFramesStep {
    fn name(&self) -> StepName {
        StepName::ExtractFrames
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        let video = run.find_video().await?.ok_or_else(|| {
            PipelineError::missing_precondition(format!(
                "no video in {}; run the {} step first",
                run.root().display(),
                StepName::Download
            ))
        })?;

        let entries = match run.preferred_transcript().await {
            Ok(text) => parse_transcript(&text),
            Err(e) if e.is_missing_precondition() => {
                warn!("No transcript, classifying frames without context");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let sponsors = run.sponsor_ranges().await?;

        let selector = FrameSelector::new(
            self.ctx.sampler(),
            self.ctx.llm()?,
            &self.ctx.config.fast_model,
            self.ctx.config.selection.clone(),
        );
        let report = selector.select(&video, run, &entries, &sponsors).await?;

        for c in &report.kept {
            info!(
                frame = %c.frame,
                timestamp = %c.timestamp,
                category = %c.category(),
                value = c.value(),
                "Kept frame"
            );
        }
        Ok(())
    }
}

/// Places kept frames into the essay as numbered figures.
pub struct PlaceImagesStep {
    ctx: Arc<StepContext>,
}

impl PlaceImagesStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for PlaceImagesStep {
    fn name(&self) -> StepName {
        StepName::PlaceImages
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        let placer = ImagePlacer::new(self.ctx.llm()?, &self.ctx.config.writer_model);
        placer.illustrate(run, self.ctx.config.embed_images).await
    }
}
