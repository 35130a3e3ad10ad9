//! Sponsor segment detection.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use vessay_client::{parse_json_response, LanguageModel, MessageRequest};
use vessay_models::{parse_mmss, SponsorRange};

use crate::error::PipelineResult;
use crate::transcript::strip_sponsored_paragraphs;

const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct SponsorResponse {
    #[serde(default)]
    sponsor_segments: Vec<SponsorSegment>,
}

/// One promotional segment as reported by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct SponsorSegment {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub reason: String,
}

impl SponsorSegment {
    /// Range in seconds; `None` when either bound is not `MM:SS`.
    pub fn range(&self) -> Option<SponsorRange> {
        Some(SponsorRange::new(parse_mmss(&self.start)?, parse_mmss(&self.end)?))
    }
}

/// Result of sponsor detection over one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct SponsorFilterOutput {
    pub ranges: Vec<SponsorRange>,
    pub cleaned: String,
}

fn build_prompt(transcript: &str) -> String {
    format!(
        r#"Below is a transcript with [MM:SS] timestamps. Find every stretch that is paid promotion rather than content: sponsor reads ("this video is brought to you by"), discount codes, product plugs and calls to action for a sponsor.

Reply with JSON only, in this shape:
{{"sponsor_segments": [{{"start": "MM:SS", "end": "MM:SS", "reason": "short note"}}]}}

Take the boundaries from the transcript's own timestamps. If nothing is promotional, return an empty list.

Transcript:
{}"#,
        transcript
    )
}

/// Parse the model reply into sponsor ranges.
///
/// Segments whose bounds are not `MM:SS` are skipped. Returns `None` when the
/// reply is not the expected JSON at all.
pub fn parse_sponsor_response(text: &str) -> Option<Vec<SponsorRange>> {
    let response: SponsorResponse = parse_json_response(text).ok()?;
    Some(
        response
            .sponsor_segments
            .iter()
            .filter_map(|segment| {
                let range = segment.range();
                if range.is_none() {
                    warn!(start = %segment.start, end = %segment.end, "Skipping sponsor segment with bad timestamps");
                }
                range
            })
            .collect(),
    )
}

/// Finds sponsor reads with a language model and cuts them from transcripts.
pub struct SponsorFilter {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl SponsorFilter {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Detect sponsor ranges and strip the paragraphs inside them.
    ///
    /// An unparseable reply is treated as "no sponsors"; API failures
    /// propagate.
    pub async fn filter(&self, transcript: &str) -> PipelineResult<SponsorFilterOutput> {
        let request = MessageRequest::new(&self.model, MAX_TOKENS).user_text(build_prompt(transcript));
        let response = self.llm.create_message(&request).await?;
        let text = response.text();

        let ranges = parse_sponsor_response(&text).unwrap_or_else(|| {
            warn!(response_len = text.len(), "Sponsor response was not valid JSON, assuming no sponsors");
            Vec::new()
        });

        info!(segments = ranges.len(), "Sponsor detection finished");

        Ok(SponsorFilterOutput {
            cleaned: strip_sponsored_paragraphs(transcript, &ranges),
            ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_response() {
        let text = "```json\n{\"sponsor_segments\": [\n  {\"start\": \"01:00\", \"end\": \"01:30\", \"reason\": \"VPN\"},\n  {\"start\": \"soon\", \"end\": \"02:00\"}\n]}\n```";
        let ranges = parse_sponsor_response(text).unwrap();
        assert_eq!(ranges, vec![SponsorRange::new(60, 90)]);
    }

    #[test]
    fn test_out_of_range_bounds_are_skipped() {
        let text = r#"{"sponsor_segments": [
            {"start": "80000000:00", "end": "80000001:00"},
            {"start": "02:00", "end": "02:45"}
        ]}"#;
        assert_eq!(parse_sponsor_response(text), Some(vec![SponsorRange::new(120, 165)]));
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(parse_sponsor_response("{\"sponsor_segments\": []}"), Some(vec![]));
        assert_eq!(parse_sponsor_response("No sponsors here."), None);
    }

    #[test]
    fn test_prompt_embeds_transcript() {
        let prompt = build_prompt("[00:00] hello");
        assert!(prompt.contains("\"sponsor_segments\""));
        assert!(prompt.ends_with("[00:00] hello"));
    }
}
