//! Frame sampling and selection.
//!
//! Sample → drop sponsor frames → deduplicate → classify → filter → persist.
//! Frames stay in ascending time order through every stage; clustering and
//! the classification record depend on it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vessay_client::{parse_json_response, ContentBlock, LanguageModel, MessageRequest};
use vessay_media::{analyze_frames, deduplicate, replace_dir, staging_dir, write_json_atomic, FrameSampler, MediaError};
use vessay_models::{
    is_sponsored, Classification, FrameCategory, FrameJudgment, SampledFrame, SponsorRange, TranscriptEntry,
};

use crate::artifacts::RunDir;
use crate::config::SelectionConfig;
use crate::error::PipelineResult;
use crate::metrics;
use crate::transcript::context_window;

const CLASSIFY_MAX_TOKENS: u32 = 256;

const CLASSIFY_PROMPT: &str = r#"Classify this frame from a video. Reply with one JSON object and nothing else:

{
  "category": one of "slide", "chart", "code", "diagram", "key_moment", "talking_head", "transition", "advertisement", "other",
  "value": 1-5, where 5 means the frame carries visual information an essay about this video should show,
  "description": a short note on what the frame shows and how it ties to what is being said
}"#;

#[derive(Debug, Deserialize)]
struct RawJudgment {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

fn judgment_value(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.map(|v| v.round().clamp(0.0, 5.0) as u8).unwrap_or(0)
}

/// Interpret a classification reply.
///
/// Never fails: text that is not a JSON object becomes
/// [`FrameJudgment::Unparsed`] holding the raw reply. Unrecognized
/// categories map to `other`; values are rounded and capped at 5, and a
/// missing or non-numeric value counts as 0.
pub fn parse_judgment(text: &str) -> FrameJudgment {
    let raw: RawJudgment = match parse_json_response(text) {
        Ok(raw) => raw,
        Err(_) => {
            return FrameJudgment::Unparsed {
                raw_text: text.trim().to_string(),
            }
        }
    };

    let category = raw
        .category
        .as_deref()
        .and_then(|c| c.parse::<FrameCategory>().ok())
        .filter(|c| *c != FrameCategory::Unknown)
        .unwrap_or(FrameCategory::Other);

    FrameJudgment::Parsed {
        category,
        value: judgment_value(raw.value.as_ref()),
        description: raw.description.unwrap_or_default().trim().to_string(),
    }
}

fn classification_prompt(timestamp: &str, context: &str) -> String {
    if context.is_empty() {
        CLASSIFY_PROMPT.to_string()
    } else {
        format!(
            "{}\n\nThe speaker is saying around this timestamp ({}):\n\"{}\"",
            CLASSIFY_PROMPT, timestamp, context
        )
    }
}

/// Frame counts after each stage plus every classification made.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub sampled: usize,
    pub after_sponsor_filter: usize,
    pub unique: usize,
    pub classifications: Vec<Classification>,
    pub kept: Vec<Classification>,
}

/// Runs the frame selection pipeline for one run.
pub struct FrameSelector {
    sampler: Arc<dyn FrameSampler>,
    llm: Arc<dyn LanguageModel>,
    model: String,
    config: SelectionConfig,
}

impl FrameSelector {
    pub fn new(
        sampler: Arc<dyn FrameSampler>,
        llm: Arc<dyn LanguageModel>,
        model: impl Into<String>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            sampler,
            llm,
            model: model.into(),
            config,
        }
    }

    /// Select the frames of `video` worth illustrating the essay with.
    ///
    /// Writes `frames/raw/`, `frames/kept/` and finally
    /// `frames/classifications.json`, which holds every classification,
    /// filtered or not.
    pub async fn select(
        &self,
        video: &Path,
        run: &RunDir,
        transcript: &[TranscriptEntry],
        sponsors: &[SponsorRange],
    ) -> PipelineResult<SelectionReport> {
        let mut report = SelectionReport::default();

        let frames = self
            .sampler
            .sample(video, &run.raw_frames_dir(), self.config.interval_secs)
            .await?;
        report.sampled = frames.len();
        metrics::record_frames("sampled", frames.len());
        info!(frames = frames.len(), interval_secs = self.config.interval_secs, "Sampled frames");

        let frames = self.exclude_sponsored(frames, sponsors);
        report.after_sponsor_filter = frames.len();
        metrics::record_frames("after_sponsor_filter", frames.len());

        let frames = self.deduplicate(frames).await?;
        report.unique = frames.len();
        metrics::record_frames("unique", frames.len());

        info!(frames = frames.len(), "Classifying unique frames");
        for frame in &frames {
            let classification = self.classify(frame, transcript).await?;
            report.classifications.push(classification);
        }

        report.kept = report
            .classifications
            .iter()
            .filter(|c| self.config.filter.keeps(c))
            .cloned()
            .collect();
        metrics::record_frames("kept", report.kept.len());

        self.persist(run, &report).await?;

        info!(
            sampled = report.sampled,
            after_sponsor_filter = report.after_sponsor_filter,
            unique = report.unique,
            kept = report.kept.len(),
            "Frame selection finished"
        );
        Ok(report)
    }

    fn exclude_sponsored(&self, frames: Vec<SampledFrame>, sponsors: &[SponsorRange]) -> Vec<SampledFrame> {
        if sponsors.is_empty() {
            return frames;
        }
        let before = frames.len();
        let kept: Vec<SampledFrame> = frames
            .into_iter()
            .filter(|f| !is_sponsored(sponsors, f.timestamp_secs, self.config.sponsor_padding_secs))
            .collect();
        if kept.len() < before {
            info!(dropped = before - kept.len(), "Dropped frames inside sponsor ranges");
        }
        kept
    }

    async fn deduplicate(&self, frames: Vec<SampledFrame>) -> PipelineResult<Vec<SampledFrame>> {
        if frames.is_empty() {
            return Ok(frames);
        }

        let paths: Vec<PathBuf> = frames.iter().map(|f| f.path.clone()).collect();
        let threshold = self.config.hamming_threshold;

        // Decoding and hashing is CPU bound
        let kept = tokio::task::spawn_blocking(move || {
            analyze_frames(&paths).map(|features| deduplicate(&features, threshold))
        })
        .await
        .map_err(|e| MediaError::internal(format!("Blocking task join error: {}", e)))??;

        debug!(before = frames.len(), after = kept.len(), threshold, "Deduplicated frames");

        let mut frames: Vec<Option<SampledFrame>> = frames.into_iter().map(Some).collect();
        Ok(kept.into_iter().filter_map(|i| frames[i].take()).collect())
    }

    async fn classify(&self, frame: &SampledFrame, transcript: &[TranscriptEntry]) -> PipelineResult<Classification> {
        let timestamp = frame.timestamp_label();
        let context = context_window(transcript, frame.timestamp_secs, self.config.context_window_secs);
        let image = tokio::fs::read(&frame.path).await?;

        let request = MessageRequest::new(&self.model, CLASSIFY_MAX_TOKENS).user(vec![
            ContentBlock::jpeg(&image),
            ContentBlock::text(classification_prompt(&timestamp, &context)),
        ]);
        let text = self.llm.create_message(&request).await?.text();

        let judgment = parse_judgment(&text);
        if let FrameJudgment::Unparsed { .. } = judgment {
            warn!(frame = %frame.file_name(), "Classification reply was not JSON, recording as unknown");
        }

        let classification = Classification::new(frame, judgment);
        debug!(
            frame = %classification.frame,
            timestamp = %classification.timestamp,
            category = %classification.category(),
            value = classification.value(),
            "Classified frame"
        );
        Ok(classification)
    }

    async fn persist(&self, run: &RunDir, report: &SelectionReport) -> PipelineResult<()> {
        let kept_dir = run.kept_frames_dir();
        let staged = staging_dir(&kept_dir)?;
        if staged.exists() {
            tokio::fs::remove_dir_all(&staged).await?;
        }
        tokio::fs::create_dir_all(&staged).await?;

        for c in &report.kept {
            tokio::fs::copy(&c.file, staged.join(&c.frame)).await?;
        }
        replace_dir(&staged, &kept_dir).await?;

        // Completion marker for the step, so it goes last
        write_json_atomic(run.classifications(), &report.classifications).await?;
        Ok(())
    }
}
