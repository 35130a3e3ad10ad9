//! Essay quality score report.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Independent axis the essay is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Faithfulness,
    Proportionality,
    Embellishment,
    Hallucination,
    Tone,
}

impl ScoreDimension {
    pub const ALL: [ScoreDimension; 5] = [
        ScoreDimension::Faithfulness,
        ScoreDimension::Proportionality,
        ScoreDimension::Embellishment,
        ScoreDimension::Hallucination,
        ScoreDimension::Tone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreDimension::Faithfulness => "faithfulness",
            ScoreDimension::Proportionality => "proportionality",
            ScoreDimension::Embellishment => "embellishment",
            ScoreDimension::Hallucination => "hallucination",
            ScoreDimension::Tone => "tone",
        }
    }

    /// Capitalized name used in the summary line.
    pub fn title(&self) -> &'static str {
        match self {
            ScoreDimension::Faithfulness => "Faithfulness",
            ScoreDimension::Proportionality => "Proportionality",
            ScoreDimension::Embellishment => "Embellishment",
            ScoreDimension::Hallucination => "Hallucination",
            ScoreDimension::Tone => "Tone",
        }
    }
}

impl fmt::Display for ScoreDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quoted passage of the essay that breaks a dimension's rubric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub essay_quote: String,
    /// Empty when the transcript has no basis for the quote
    #[serde(default)]
    pub transcript_evidence: String,
    #[serde(default)]
    pub explanation: String,
}

/// Airtime share of one topic, reported for proportionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicShare {
    pub topic: String,
    pub transcript_share: String,
    pub essay_share: String,
    #[serde(default)]
    pub assessment: String,
}

/// Judgment returned for a single dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_analysis: Vec<TopicShare>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// 1 (poor) to 10 (excellent)
    pub score: u8,
    #[serde(default)]
    pub rationale: String,
}

/// Aggregated scores for one essay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub dimensions: BTreeMap<ScoreDimension, DimensionScore>,
    pub overall: f64,
    pub summary: String,
    /// Judge model that produced the scores
    #[serde(default)]
    pub model: String,
}

impl ScoreReport {
    /// Build the report; `overall` is the mean rounded to one decimal.
    pub fn from_dimensions(dimensions: BTreeMap<ScoreDimension, DimensionScore>) -> Self {
        let overall = if dimensions.is_empty() {
            0.0
        } else {
            let sum: f64 = dimensions.values().map(|d| f64::from(d.score)).sum();
            (sum / dimensions.len() as f64 * 10.0).round() / 10.0
        };

        let summary = dimensions
            .iter()
            .map(|(dim, score)| format!("{}: {}", dim.title(), score.rationale))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            dimensions,
            overall,
            summary,
            model: String::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: u8, rationale: &str) -> DimensionScore {
        DimensionScore {
            reasoning: String::new(),
            topic_analysis: vec![],
            violations: vec![],
            score: value,
            rationale: rationale.to_string(),
        }
    }

    #[test]
    fn test_overall_is_rounded_mean() {
        let dims: BTreeMap<_, _> = [
            (ScoreDimension::Tone, score(7, "Neutral.")),
            (ScoreDimension::Faithfulness, score(9, "Accurate.")),
            (ScoreDimension::Hallucination, score(8, "Clean.")),
        ]
        .into_iter()
        .collect();

        let report = ScoreReport::from_dimensions(dims);
        assert_eq!(report.overall, 8.0);
        assert_eq!(
            report.summary,
            "Faithfulness: Accurate. Hallucination: Clean. Tone: Neutral."
        );
    }

    #[test]
    fn test_overall_rounding() {
        let dims: BTreeMap<_, _> = [
            (ScoreDimension::Tone, score(7, "")),
            (ScoreDimension::Faithfulness, score(8, "")),
            (ScoreDimension::Embellishment, score(8, "")),
        ]
        .into_iter()
        .collect();
        assert_eq!(ScoreReport::from_dimensions(dims).overall, 7.7);
        assert_eq!(ScoreReport::from_dimensions(BTreeMap::new()).overall, 0.0);
    }

    #[test]
    fn test_report_json_keys() {
        let dims: BTreeMap<_, _> = [(ScoreDimension::Proportionality, score(6, "Skewed."))]
            .into_iter()
            .collect();
        let json = serde_json::to_value(ScoreReport::from_dimensions(dims)).unwrap();
        assert_eq!(json["dimensions"]["proportionality"]["score"], 6);
    }
}
