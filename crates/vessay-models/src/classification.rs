//! Frame classification results and the keep/skip filter.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::SampledFrame;
use crate::timestamp::parse_mmss;

/// Default minimum relevance value for a frame to be kept.
pub const DEFAULT_MIN_VALUE: u8 = 3;

/// Visual category assigned to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameCategory {
    Slide,
    Chart,
    Code,
    Diagram,
    KeyMoment,
    TalkingHead,
    Transition,
    Advertisement,
    Other,
    /// Sentinel for responses that could not be parsed.
    Unknown,
}

impl FrameCategory {
    pub const ALL: [FrameCategory; 10] = [
        FrameCategory::Slide,
        FrameCategory::Chart,
        FrameCategory::Code,
        FrameCategory::Diagram,
        FrameCategory::KeyMoment,
        FrameCategory::TalkingHead,
        FrameCategory::Transition,
        FrameCategory::Advertisement,
        FrameCategory::Other,
        FrameCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameCategory::Slide => "slide",
            FrameCategory::Chart => "chart",
            FrameCategory::Code => "code",
            FrameCategory::Diagram => "diagram",
            FrameCategory::KeyMoment => "key_moment",
            FrameCategory::TalkingHead => "talking_head",
            FrameCategory::Transition => "transition",
            FrameCategory::Advertisement => "advertisement",
            FrameCategory::Other => "other",
            FrameCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        FrameCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown frame category: {s}"))
    }
}

/// Outcome of asking the vision model about one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameJudgment {
    Parsed {
        category: FrameCategory,
        value: u8,
        description: String,
    },
    /// The model answered with something that was not the expected JSON.
    Unparsed { raw_text: String },
}

impl FrameJudgment {
    pub fn category(&self) -> FrameCategory {
        match self {
            FrameJudgment::Parsed { category, .. } => *category,
            FrameJudgment::Unparsed { .. } => FrameCategory::Unknown,
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            FrameJudgment::Parsed { value, .. } => *value,
            FrameJudgment::Unparsed { .. } => 0,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            FrameJudgment::Parsed { description, .. } => description,
            FrameJudgment::Unparsed { raw_text } => raw_text,
        }
    }
}

/// Persisted classification of one unique frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ClassificationRecord", into = "ClassificationRecord")]
pub struct Classification {
    pub judgment: FrameJudgment,
    /// Frame file name, e.g. `frame_0007.jpg`
    pub frame: String,
    /// Frame timestamp as `MM:SS`
    pub timestamp: String,
    /// Path of the sampled image the judgment was made on
    pub file: PathBuf,
}

impl Classification {
    pub fn new(frame: &SampledFrame, judgment: FrameJudgment) -> Self {
        Self {
            judgment,
            frame: frame.file_name(),
            timestamp: frame.timestamp_label(),
            file: frame.path.clone(),
        }
    }

    pub fn category(&self) -> FrameCategory {
        self.judgment.category()
    }

    pub fn value(&self) -> u8 {
        self.judgment.value()
    }

    pub fn description(&self) -> &str {
        self.judgment.description()
    }

    /// Timestamp in seconds, or 0 when the label is malformed.
    pub fn timestamp_secs(&self) -> u32 {
        parse_mmss(&self.timestamp).unwrap_or(0)
    }
}

/// Flat on-disk shape of a [`Classification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassificationRecord {
    category: FrameCategory,
    value: u8,
    description: String,
    frame: String,
    timestamp: String,
    file: PathBuf,
}

impl From<ClassificationRecord> for Classification {
    fn from(r: ClassificationRecord) -> Self {
        let judgment = match r.category {
            FrameCategory::Unknown => FrameJudgment::Unparsed {
                raw_text: r.description,
            },
            category => FrameJudgment::Parsed {
                category,
                value: r.value,
                description: r.description,
            },
        };
        Self {
            judgment,
            frame: r.frame,
            timestamp: r.timestamp,
            file: r.file,
        }
    }
}

impl From<Classification> for ClassificationRecord {
    fn from(c: Classification) -> Self {
        Self {
            category: c.category(),
            value: c.value(),
            description: c.description().to_string(),
            frame: c.frame,
            timestamp: c.timestamp,
            file: c.file,
        }
    }
}

/// Keep/skip rule applied to classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilter {
    pub skip: HashSet<FrameCategory>,
    pub min_value: u8,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self {
            skip: [
                FrameCategory::TalkingHead,
                FrameCategory::Transition,
                FrameCategory::Advertisement,
            ]
            .into_iter()
            .collect(),
            min_value: DEFAULT_MIN_VALUE,
        }
    }
}

impl FrameFilter {
    pub fn keeps(&self, classification: &Classification) -> bool {
        !self.skip.contains(&classification.category()) && classification.value() >= self.min_value
    }
}
