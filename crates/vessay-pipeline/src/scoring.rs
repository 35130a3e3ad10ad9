//! Essay quality scoring against the source transcript.
//!
//! Each dimension is judged by its own forced tool call so the model
//! focuses on one rubric at a time. Calls run concurrently through a
//! bounded pool and results are collected by dimension.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::info;
use vessay_client::{LanguageModel, MessageRequest, Tool};
use vessay_models::{DimensionScore, ScoreDimension, ScoreReport};

use crate::error::{PipelineError, PipelineResult};

pub const SCORE_TOOL_NAME: &str = "score_dimension";
const SCORE_MAX_TOKENS: u32 = 4096;

fn rubric(dimension: ScoreDimension) -> &'static str {
    match dimension {
        ScoreDimension::Faithfulness => {
            r#"## Faithfulness (1-10)
Can each claim in the essay be found in the transcript?
- 1: most claims have no basis in the transcript
- 4: several unsupported claims among accurate ones
- 7: almost everything traceable, small gaps
- 10: every claim is directly backed by the transcript"#
        }
        ScoreDimension::Proportionality => {
            r#"## Proportionality (1-10)
Does the essay give each topic room in line with the airtime it got?
- 1: major topics missing or minor ones dominating
- 4: clear imbalance, some topics over or under weighted
- 7: mostly in proportion with small deviations
- 10: essay space tracks transcript airtime closely

Also fill topic_analysis with the 3-5 biggest topics and their rough share of the transcript versus the essay."#
        }
        ScoreDimension::Embellishment => {
            r#"## Embellishment (1-10)
Does the essay add analysis, conclusions or framing the speaker never offered?
- 1: editorializing and invented conclusions throughout
- 4: several added interpretations
- 7: rare, minor additions
- 10: reports only what was said"#
        }
        ScoreDimension::Hallucination => {
            r#"## Hallucination (1-10)
Does the essay state names, numbers, events or other specifics that appear nowhere in the transcript?
Judge against the transcript only. A claim the transcript makes is not a hallucination even if you think it is factually wrong.
- 1: several invented specifics
- 4: a few details with no source in the transcript
- 7: at most one small detail beyond the transcript
- 10: every specific can be found in the transcript"#
        }
        ScoreDimension::Tone => {
            r#"## Tone (1-10)
Does the essay sound like the speaker, or has it been formalized?
- 1: a different voice entirely, academic or corporate
- 4: noticeably stiffer, most personality gone
- 7: the speaker's style mostly survives
- 10: reads as if the speaker wrote it"#
        }
    }
}

fn scoring_prompt(transcript: &str, essay: &str, dimension: ScoreDimension) -> String {
    format!(
        r#"You are a strict judge comparing an essay with the transcript it was written from. Score the essay on the one dimension described below and submit the result with the {tool} tool.

<TRANSCRIPT>
{transcript}
</TRANSCRIPT>

<ESSAY>
{essay}
</ESSAY>

{rubric}

Quote every violation you find. If there are none, leave the violations list empty."#,
        tool = SCORE_TOOL_NAME,
        transcript = transcript,
        essay = essay,
        rubric = rubric(dimension),
    )
}

fn violation_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "essay_quote": {"type": "string"},
            "transcript_evidence": {
                "type": "string",
                "description": "Matching transcript excerpt, or an empty string when there is none"
            },
            "explanation": {"type": "string"}
        },
        "required": ["essay_quote", "transcript_evidence", "explanation"]
    })
}

/// Tool the judge must call; proportionality also reports topic shares.
pub fn score_tool(dimension: ScoreDimension) -> Tool {
    let mut properties = json!({
        "reasoning": {
            "type": "string",
            "description": "Walk through the evidence before settling on a score"
        },
        "violations": {
            "type": "array",
            "items": violation_schema(),
            "description": "Every violation found, empty when there are none"
        },
        "score": {"type": "integer", "description": "1-10"},
        "rationale": {"type": "string", "description": "Two or three sentences"}
    });
    let mut required = vec!["reasoning", "violations", "score", "rationale"];

    if dimension == ScoreDimension::Proportionality {
        properties["topic_analysis"] = json!({
            "type": "array",
            "items": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "topic": {"type": "string"},
                    "transcript_share": {"type": "string"},
                    "essay_share": {"type": "string"},
                    "assessment": {"type": "string"}
                },
                "required": ["topic", "transcript_share", "essay_share", "assessment"]
            },
            "description": "The 3-5 biggest topics with transcript and essay share"
        });
        required.insert(1, "topic_analysis");
    }

    Tool {
        name: SCORE_TOOL_NAME.to_string(),
        description: "Submit the score for this dimension.".to_string(),
        input_schema: json!({
            "type": "object",
            "additionalProperties": false,
            "properties": properties,
            "required": required
        }),
    }
}

/// Judges essays on every [`ScoreDimension`].
pub struct EssayScorer {
    llm: Arc<dyn LanguageModel>,
    model: String,
    concurrency: usize,
}

impl EssayScorer {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>, concurrency: usize) -> Self {
        Self {
            llm,
            model: model.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Score a single dimension.
    pub async fn score_dimension(
        &self,
        transcript: &str,
        essay: &str,
        dimension: ScoreDimension,
    ) -> PipelineResult<DimensionScore> {
        let request = MessageRequest::new(&self.model, SCORE_MAX_TOKENS)
            .user_text(scoring_prompt(transcript, essay, dimension))
            .force_tool(score_tool(dimension));
        let response = self.llm.create_message(&request).await?;

        let input = response.tool_input(SCORE_TOOL_NAME)?.clone();
        let mut score: DimensionScore = serde_json::from_value(input).map_err(|e| {
            PipelineError::invalid_output(format!("{} score did not match the tool schema: {}", dimension, e))
        })?;
        score.score = score.score.clamp(1, 10);

        info!(dimension = %dimension, score = score.score, "Dimension scored");
        Ok(score)
    }

    /// Score all dimensions concurrently and aggregate the report.
    ///
    /// Any failed dimension fails the whole report.
    pub async fn score(&self, transcript: &str, essay: &str) -> PipelineResult<ScoreReport> {
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let tasks = ScoreDimension::ALL.into_iter().map(|dimension| {
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| PipelineError::invalid_output(format!("scoring pool closed: {}", e)))?;
                let score = self.score_dimension(transcript, essay, dimension).await?;
                Ok::<_, PipelineError>((dimension, score))
            }
        });

        let mut dimensions = BTreeMap::new();
        for result in join_all(tasks).await {
            let (dimension, score) = result?;
            dimensions.insert(dimension, score);
        }

        let report = ScoreReport::from_dimensions(dimensions).with_model(&self.model);
        info!(overall = report.overall, "Essay scored");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vessay_client::{ClientResult, MessageResponse, ResponseBlock};

    /// Judge that scores by dimension and tracks peak concurrency.
    #[derive(Default)]
    struct FakeJudge {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for FakeJudge {
        async fn create_message(&self, request: &MessageRequest) -> ClientResult<MessageResponse> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let prompt = match &request.messages[0].content[0] {
                vessay_client::ContentBlock::Text { text } => text.clone(),
                _ => String::new(),
            };
            let score = if prompt.contains("## Tone") { 6 } else { 9 };
            let mut input = json!({
                "reasoning": "checked",
                "violations": [],
                "score": score,
                "rationale": "Fine."
            });
            if prompt.contains("## Proportionality") {
                input["topic_analysis"] = json!([{
                    "topic": "GPUs", "transcript_share": "60%", "essay_share": "55%", "assessment": "ok"
                }]);
            }
            Ok(MessageResponse {
                content: vec![ResponseBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: SCORE_TOOL_NAME.into(),
                    input,
                }],
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_proportionality_tool_has_topics() {
        let tool = score_tool(ScoreDimension::Proportionality);
        assert!(tool.input_schema["properties"]["topic_analysis"].is_object());
        assert_eq!(tool.input_schema["required"][1], "topic_analysis");

        let tool = score_tool(ScoreDimension::Tone);
        assert!(tool.input_schema["properties"].get("topic_analysis").is_none());
        assert_eq!(tool.name, "score_dimension");
    }

    #[tokio::test]
    async fn test_scores_every_dimension_with_bounded_pool() {
        let judge = Arc::new(FakeJudge::default());
        let scorer = EssayScorer::new(judge.clone(), "judge-model", 2);

        let report = scorer.score("[00:00] transcript", "# Essay").await.unwrap();

        assert_eq!(report.dimensions.len(), 5);
        assert_eq!(report.dimensions[&ScoreDimension::Tone].score, 6);
        assert_eq!(report.overall, 8.4);
        assert_eq!(report.model, "judge-model");
        assert_eq!(
            report.dimensions[&ScoreDimension::Proportionality].topic_analysis[0].topic,
            "GPUs"
        );
        assert!(report.summary.starts_with("Faithfulness: Fine."));
        assert!(judge.peak.load(Ordering::SeqCst) <= 2);
    }
}
