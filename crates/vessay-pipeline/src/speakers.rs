//! Mapping diarization speaker ids to real names.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{info, warn};
use vessay_client::{parse_json_response, LanguageModel, MessageRequest};
use vessay_models::{format_mmss, Utterance, VideoInfo};

use crate::error::PipelineResult;

const MAX_TOKENS: u32 = 256;
/// Utterances shown to the model.
const SAMPLE_UTTERANCES: usize = 80;
const DESCRIPTION_CHARS: usize = 1500;

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

fn build_prompt(utterances: &[Utterance], info: &VideoInfo, ids: &BTreeSet<u32>) -> String {
    let sample = utterances
        .iter()
        .take(SAMPLE_UTTERANCES)
        .map(|u| {
            format!(
                "[{}] Speaker {}: {}",
                format_mmss(u.start.max(0.0) as u32),
                u.speaker,
                u.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let description: String = info.description.chars().take(DESCRIPTION_CHARS).collect();
    let ids = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");

    format!(
        r#"The transcript below was diarized automatically, so speakers only have numeric ids. Work out who each id is.

Video title: {title}
Channel: {channel}
Description:
{description}

Speaker ids: {ids}

Opening of the transcript:
{sample}

Names usually appear in the title, the description or the channel name. Conversation cues help too: the host welcomes people and asks questions, guests get introduced. If you cannot tell who an id is, call them "Speaker N".

Reply with a single JSON object mapping each id (as a string) to a name, for example {{"0": "Jane Doe", "1": "John Roe"}}. No other text."#,
        title = or_na(&info.title),
        channel = or_na(&info.channel),
        description = or_na(&description),
        ids = ids,
        sample = sample,
    )
}

/// Parse a `{"0": "Name"}` reply, keeping only well-formed entries.
pub fn parse_speaker_map(text: &str) -> Option<HashMap<u32, String>> {
    let raw: HashMap<String, String> = parse_json_response(text).ok()?;
    Some(
        raw.into_iter()
            .filter_map(|(id, name)| {
                let name = name.trim();
                (!name.is_empty()).then_some((id.trim().parse().ok()?, name.to_string()))
            })
            .collect(),
    )
}

/// Fallback name for an unidentified speaker.
pub fn default_name(id: u32) -> String {
    format!("Speaker {}", id)
}

/// Names diarized speakers from video metadata and conversational cues.
pub struct SpeakerNamer {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl SpeakerNamer {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Map every speaker id in `utterances` to a display name.
    ///
    /// Ids the model did not name, or every id when its reply cannot be
    /// parsed, get `Speaker N`.
    pub async fn name_speakers(
        &self,
        utterances: &[Utterance],
        info: &VideoInfo,
    ) -> PipelineResult<HashMap<u32, String>> {
        let ids: BTreeSet<u32> = utterances.iter().map(|u| u.speaker).collect();

        let request =
            MessageRequest::new(&self.model, MAX_TOKENS).user_text(build_prompt(utterances, info, &ids));
        let response = self.llm.create_message(&request).await?;
        let text = response.text();

        let mut names = parse_speaker_map(&text).unwrap_or_else(|| {
            warn!(response = %text, "Could not parse speaker mapping, using generic names");
            HashMap::new()
        });
        for id in ids {
            names.entry(id).or_insert_with(|| default_name(id));
        }

        info!(speakers = names.len(), "Speaker names resolved");
        Ok(names)
    }
}
