use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use vessay_client::SpeechToText;
use vessay_media::{extract_audio, write_atomic, write_json_atomic};
use vessay_models::{Utterance, VideoInfo};

use super::StepContext;
use crate::artifacts::RunDir;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::{Step, StepName};
use crate::speakers::{default_name, SpeakerNamer};
use crate::transcript::{format_utterances, group_captions, speaker_count};

/// Produces `transcript.txt`: diarized speech-to-text when available,
/// auto-captions otherwise.
pub struct TranscriptStep {
    ctx: Arc<StepContext>,
}

impl TranscriptStep {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }

    async fn audio(&self, run: &RunDir) -> PipelineResult<PathBuf> {
        let audio = run.audio();
        if audio.exists() {
            info!(path = %audio.display(), "Reusing extracted audio");
            return Ok(audio);
        }

        if let Some(video) = run.find_video().await? {
            extract_audio(self.ctx.ffmpeg(), &video, &audio).await?;
            return Ok(audio);
        }

        Ok(self
            .ctx
            .ytdlp()
            .download_audio(&run.video_id().watch_url(), run.root())
            .await?)
    }

    async fn utterances(&self, run: &RunDir, speech: &dyn SpeechToText) -> PipelineResult<Vec<Utterance>> {
        if let Some(cached) = run.read_json::<Vec<Utterance>>(&run.diarization()).await? {
            info!(utterances = cached.len(), "Reusing cached diarization");
            return Ok(cached);
        }

        let audio = self.audio(run).await?;
        let bytes = tokio::fs::read(&audio).await?;
        info!(size_mb = bytes.len() as f64 / (1024.0 * 1024.0), "Sending audio for transcription");

        let utterances = speech.transcribe(bytes, "audio/mpeg").await?;
        write_json_atomic(run.diarization(), &utterances).await?;
        info!(
            utterances = utterances.len(),
            speakers = speaker_count(&utterances),
            "Diarization saved"
        );
        Ok(utterances)
    }

    async fn video_info(&self, run: &RunDir) -> VideoInfo {
        match run.read_json::<VideoInfo>(&run.video_info()).await {
            Ok(Some(info)) => return info,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable video info cache"),
        }

        match self.ctx.ytdlp().fetch_info(&run.video_id().watch_url()).await {
            Ok(info) => {
                if let Err(e) = write_json_atomic(run.video_info(), &info).await {
                    warn!(error = %e, "Failed to cache video info");
                }
                info
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch video info, naming speakers without it");
                VideoInfo::default()
            }
        }
    }

    async fn speaker_names(&self, run: &RunDir, utterances: &[Utterance]) -> PipelineResult<HashMap<u32, String>> {
        if let Some(cached) = run.read_json::<HashMap<u32, String>>(&run.speaker_map()).await? {
            return Ok(cached);
        }

        let names = match self.ctx.llm() {
            Ok(llm) => {
                let info = self.video_info(run).await;
                SpeakerNamer::new(llm, &self.ctx.config.fast_model)
                    .name_speakers(utterances, &info)
                    .await?
            }
            Err(e) => {
                warn!(error = %e, "No language model, using generic speaker names");
                utterances.iter().map(|u| (u.speaker, default_name(u.speaker))).collect()
            }
        };

        write_json_atomic(run.speaker_map(), &names).await?;
        Ok(names)
    }

    async fn diarized(&self, run: &RunDir, speech: &dyn SpeechToText) -> PipelineResult<String> {
        let utterances = self.utterances(run, speech).await?;
        if utterances.is_empty() {
            return Err(PipelineError::transcript_unavailable("transcription returned no utterances"));
        }

        if speaker_count(&utterances) > 1 {
            let names = self.speaker_names(run, &utterances).await?;
            Ok(format_utterances(&utterances, Some(&names)))
        } else {
            Ok(format_utterances(&utterances, None))
        }
    }

    async fn captions(&self, run: &RunDir) -> PipelineResult<String> {
        let events = self
            .ctx
            .ytdlp()
            .fetch_captions(&run.video_id().watch_url())
            .await
            .map_err(|e| PipelineError::transcript_unavailable(e.to_string()))?;

        let text = group_captions(&events);
        if text.is_empty() {
            return Err(PipelineError::transcript_unavailable("captions contained no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl Step for TranscriptStep {
    fn name(&self) -> StepName {
        StepName::Transcript
    }

    async fn execute(&self, run: &RunDir) -> PipelineResult<()> {
        run.ensure().await?;

        let diarized = match self.ctx.speech() {
            Some(speech) => match self.diarized(run, speech.as_ref()).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "Diarized transcription failed, falling back to captions");
                    None
                }
            },
            None => {
                info!("DEEPGRAM_API_KEY not set, using captions");
                None
            }
        };

        let transcript = match diarized {
            Some(text) => text,
            None => self.captions(run).await?,
        };

        write_atomic(run.transcript(), &transcript).await?;
        info!(chars = transcript.len(), "Transcript saved");
        Ok(())
    }
}
