//! Concrete pipeline steps.
//!
//! Every step reads its inputs from the run directory and writes exactly one
//! completion artifact, so any step can be re-run on its own.

mod media;
mod text;
mod transcript;

use std::sync::Arc;

use vessay_client::{AnthropicClient, DeepgramClient, LanguageModel, SpeechToText};
use vessay_media::{FfmpegFrameSampler, FfmpegRunner, FrameSampler, YtDlp};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::{Step, StepName};

pub use media::{DownloadStep, ExtractFramesStep, PlaceImagesStep};
pub use text::{EssayStep, ScoreStep, SponsorFilterStep};
pub use transcript::TranscriptStep;

/// Collaborators and settings shared by all steps.
pub struct StepContext {
    pub config: PipelineConfig,
    llm: Option<Arc<dyn LanguageModel>>,
    speech: Option<Arc<dyn SpeechToText>>,
    sampler: Arc<dyn FrameSampler>,
    ytdlp: YtDlp,
    ffmpeg: FfmpegRunner,
}

impl StepContext {
    /// Build real collaborators from configuration.
    ///
    /// Missing credentials leave the matching collaborator unset; steps that
    /// need it fail when they run.
    pub fn from_config(config: PipelineConfig) -> Self {
        let retry = config.retry_config();

        let llm = config.anthropic_api_key.as_ref().map(|key| {
            Arc::new(
                AnthropicClient::new(key.clone())
                    .with_retry(retry.named("anthropic"))
                    .with_timeout(config.http_timeout),
            ) as Arc<dyn LanguageModel>
        });
        let speech = config.deepgram_api_key.as_ref().map(|key| {
            Arc::new(
                DeepgramClient::new(key.clone())
                    .with_retry(retry.named("deepgram"))
                    .with_timeout(config.http_timeout),
            ) as Arc<dyn SpeechToText>
        });

        let ffmpeg = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout.as_secs());
        let ytdlp = YtDlp::new(config.download_timeout.as_secs()).with_cookies(config.cookies.clone());

        Self {
            sampler: Arc::new(FfmpegFrameSampler::new(ffmpeg.clone())),
            llm,
            speech,
            ytdlp,
            ffmpeg,
            config,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_speech(mut self, speech: Option<Arc<dyn SpeechToText>>) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn FrameSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// The language model, or a configuration error when no key is set.
    pub fn llm(&self) -> PipelineResult<Arc<dyn LanguageModel>> {
        self.llm
            .clone()
            .ok_or_else(|| PipelineError::config_error("ANTHROPIC_API_KEY is not set"))
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub fn speech(&self) -> Option<Arc<dyn SpeechToText>> {
        self.speech.clone()
    }

    pub fn sampler(&self) -> Arc<dyn FrameSampler> {
        Arc::clone(&self.sampler)
    }

    pub fn ytdlp(&self) -> &YtDlp {
        &self.ytdlp
    }

    pub fn ffmpeg(&self) -> &FfmpegRunner {
        &self.ffmpeg
    }
}

/// The step implementing `name`.
pub fn step_for(name: StepName, ctx: &Arc<StepContext>) -> Arc<dyn Step> {
    let ctx = Arc::clone(ctx);
    match name {
        StepName::Transcript => Arc::new(TranscriptStep::new(ctx)),
        StepName::SponsorFilter => Arc::new(SponsorFilterStep::new(ctx)),
        StepName::Essay => Arc::new(EssayStep::new(ctx)),
        StepName::Download => Arc::new(DownloadStep::new(ctx)),
        StepName::ExtractFrames => Arc::new(ExtractFramesStep::new(ctx)),
        StepName::PlaceImages => Arc::new(PlaceImagesStep::new(ctx)),
        StepName::Score => Arc::new(ScoreStep::new(ctx)),
    }
}

/// Steps of a full run, optionally ending with scoring.
pub fn full_run(ctx: &Arc<StepContext>, score: bool) -> Vec<Arc<dyn Step>> {
    StepName::ALL
        .into_iter()
        .filter(|name| score || *name != StepName::Score)
        .map(|name| step_for(name, ctx))
        .collect()
}
