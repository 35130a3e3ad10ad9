//! Transcript-to-essay generation.
//!
//! Generation is two calls: a fast model first profiles how the speaker (or
//! each speaker) talks, then the writer model rewrites the transcript as
//! prose in that voice. Multi-speaker transcripts become an attributed
//! dialogue instead of a monologue.

use std::sync::Arc;

use tracing::info;
use vessay_client::{LanguageModel, MessageRequest};

use crate::error::{PipelineError, PipelineResult};
use crate::transcript::{extract_speakers, is_multi_speaker};

/// Transcript prefix shown to the style profiler.
pub const STYLE_SAMPLE_CHARS: usize = 8000;
const SINGLE_PROFILE_TOKENS: u32 = 512;
const MULTI_PROFILE_TOKENS: u32 = 1024;
const ESSAY_TOKENS: u32 = 16384;

/// Shape of the essay derived from the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EssayKind {
    Monologue,
    Dialogue { speakers: Vec<String> },
}

impl EssayKind {
    pub fn detect(transcript: &str) -> Self {
        if is_multi_speaker(transcript) {
            EssayKind::Dialogue {
                speakers: extract_speakers(transcript),
            }
        } else {
            EssayKind::Monologue
        }
    }
}

fn style_sample(transcript: &str) -> &str {
    match transcript.char_indices().nth(STYLE_SAMPLE_CHARS) {
        Some((idx, _)) => &transcript[..idx],
        None => transcript,
    }
}

fn profile_prompt(kind: &EssayKind, sample: &str) -> String {
    match kind {
        EssayKind::Monologue => format!(
            r#"Describe how the speaker in this transcript excerpt talks, in about 200 words. Cover:
- how formal or casual they are
- pet phrases and verbal habits
- how they speak to the audience
- typical sentence length and rhythm
- kind of humor, if any
- overall emotional register
- three short quotes that sound most like them

Be concrete. The profile will be used to keep their voice when the transcript is turned into writing.

{}"#,
            sample
        ),
        EssayKind::Dialogue { speakers } => format!(
            r#"This excerpt has several speakers: {}.

For each one, describe in about 100 words how they talk:
- how formal or casual they are
- pet phrases and verbal habits
- their role in the conversation (host, guest, moderator...)
- typical sentence length and rhythm
- kind of humor, if any
- overall emotional register
- two short quotes that sound most like them

Be concrete. The profiles will be used to keep each voice distinct when the conversation is turned into writing.

{}"#,
            speakers.join(", "),
            sample
        ),
    }
}

fn system_prompt(kind: &EssayKind, profile: &str) -> String {
    match kind {
        EssayKind::Monologue => format!(
            r#"You turn video transcripts into essays that read as if the speaker sat down and wrote them. Keeping their voice matters more than polish.

## How this speaker talks
{profile}

## Keep
- contractions, casual words and hedges the speaker actually uses
- direct address to the audience and first person
- jokes, asides, opinions and short punchy sentences
- the speaker's own word choices

## Avoid
- swapping plain words for formal ones
- stock transitions such as "Furthermore" or "In conclusion"
- forcing a thesis and conclusion structure onto the material
- adding qualifiers, filler or length the speaker did not have

## Layout
- headings in the speaker's register
- short paragraphs that follow the speaker's pacing
- drop verbal filler and repetition, fix grammar only where it would confuse a reader
- leave out sponsor reads and other promotion"#
        ),
        EssayKind::Dialogue { speakers } => {
            let speaker_list = speakers
                .iter()
                .map(|s| format!("- {}", s))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                r#"You turn multi-speaker video transcripts (podcasts, interviews, panels) into a clean written dialogue. Every speaker must keep a distinct voice and the back-and-forth must survive.

## Speakers
{speaker_list}

## How each speaker talks
{profile}

## Keep
- attribution for every turn, in the order people spoke
- each speaker's register, phrases, jargon and humor
- agreement, pushback and interruptions between speakers

## Avoid
- merging the conversation into a single narrator
- making everyone sound alike
- formal substitutions, stock transitions and filler

## Layout
- every turn as **Speaker Name**: text
- a `## Topic` heading when the conversation moves to a new subject
- drop verbal filler and repetition, fix grammar only where it would confuse a reader
- leave out sponsor reads and other promotion"#
            )
        }
    }
}

fn user_prompt(kind: &EssayKind, transcript: &str) -> String {
    let instruction = match kind {
        EssayKind::Monologue => {
            "Rewrite the transcript below as an essay, keeping the voice described in the profile."
        }
        EssayKind::Dialogue { .. } => {
            "Rewrite the transcript below as a clean dialogue, keeping every speaker's voice as profiled."
        }
    };
    format!("{}\n\n{}", instruction, transcript)
}

/// Writes essays from transcripts.
pub struct EssayWriter {
    llm: Arc<dyn LanguageModel>,
    fast_model: String,
    writer_model: String,
}

impl EssayWriter {
    pub fn new(llm: Arc<dyn LanguageModel>, fast_model: impl Into<String>, writer_model: impl Into<String>) -> Self {
        Self {
            llm,
            fast_model: fast_model.into(),
            writer_model: writer_model.into(),
        }
    }

    /// Profile the speaking style from the start of the transcript.
    pub async fn style_profile(&self, kind: &EssayKind, transcript: &str) -> PipelineResult<String> {
        let max_tokens = match kind {
            EssayKind::Monologue => SINGLE_PROFILE_TOKENS,
            EssayKind::Dialogue { .. } => MULTI_PROFILE_TOKENS,
        };
        let request = MessageRequest::new(&self.fast_model, max_tokens)
            .user_text(profile_prompt(kind, style_sample(transcript)));
        Ok(self.llm.create_message(&request).await?.text())
    }

    /// Produce the essay text for `transcript`.
    pub async fn write(&self, transcript: &str) -> PipelineResult<String> {
        if transcript.trim().is_empty() {
            return Err(PipelineError::missing_precondition("transcript is empty"));
        }

        let kind = EssayKind::detect(transcript);
        match &kind {
            EssayKind::Monologue => info!("Writing single-speaker essay"),
            EssayKind::Dialogue { speakers } => {
                info!(speakers = %speakers.join(", "), "Writing multi-speaker dialogue")
            }
        }

        let profile = self.style_profile(&kind, transcript).await?;
        info!(profile_len = profile.len(), "Style profile extracted");

        let request = MessageRequest::new(&self.writer_model, ESSAY_TOKENS)
            .system(system_prompt(&kind, &profile))
            .user_text(user_prompt(&kind, transcript))
            .streaming();
        let essay = self.llm.create_message(&request).await?.text();

        if essay.trim().is_empty() {
            return Err(PipelineError::invalid_output("writer returned an empty essay"));
        }
        Ok(essay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vessay_client::{ClientResult, MessageResponse};

    #[derive(Default)]
    struct RecordingModel {
        requests: Mutex<Vec<MessageRequest>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn create_message(&self, request: &MessageRequest) -> ClientResult<MessageResponse> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(MessageResponse::from_text(if requests.len() == 1 {
                "Casual, fast, sarcastic."
            } else {
                "# Essay\n\nSo basically it worked."
            }))
        }
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(EssayKind::detect("[00:00] solo talk"), EssayKind::Monologue);
        assert_eq!(
            EssayKind::detect("**Ann** [00:00]\nhi\n\n**Bo** [00:05]\nhey"),
            EssayKind::Dialogue {
                speakers: vec!["Ann".into(), "Bo".into()]
            }
        );
    }

    #[test]
    fn test_style_sample_respects_char_boundaries() {
        let text = "é".repeat(STYLE_SAMPLE_CHARS + 10);
        assert_eq!(style_sample(&text).chars().count(), STYLE_SAMPLE_CHARS);
        assert_eq!(style_sample("short"), "short");
    }

    #[tokio::test]
    async fn test_single_speaker_flow() {
        let model = Arc::new(RecordingModel::default());
        let writer = EssayWriter::new(model.clone(), "fast", "writer");

        let essay = writer.write("[00:00] so basically it kinda worked").await.unwrap();
        assert!(essay.starts_with("# Essay"));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "fast");
        assert_eq!(requests[0].max_tokens, 512);
        assert_eq!(requests[1].model, "writer");
        assert!(requests[1].stream);
        assert!(requests[1].system.as_deref().unwrap().contains("Casual, fast, sarcastic."));
    }

    #[tokio::test]
    async fn test_multi_speaker_uses_dialogue_prompts() {
        let model = Arc::new(RecordingModel::default());
        let writer = EssayWriter::new(model.clone(), "fast", "writer");

        writer
            .write("**Ann** [00:00]\nhi\n\n**Bo** [00:05]\nhey")
            .await
            .unwrap();

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, 1024);
        let system = requests[1].system.as_deref().unwrap();
        assert!(system.contains("- Ann\n- Bo"));
        assert!(system.contains("**Speaker Name**: text"));
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected() {
        let writer = EssayWriter::new(Arc::new(RecordingModel::default()), "fast", "writer");
        assert!(writer.write("  \n").await.unwrap_err().is_missing_precondition());
    }
}
