//! Transcript building blocks shared between sources and consumers.

use serde::{Deserialize, Serialize};

/// One diarized utterance from the speech-to-text service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub start: f64,
    pub end: f64,
    /// Absent when diarization found a single voice
    #[serde(default)]
    pub speaker: u32,
    #[serde(alias = "transcript")]
    pub text: String,
}

/// One caption fragment with its offset in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEvent {
    pub start_ms: u64,
    pub text: String,
}

/// A timestamped line parsed back out of a transcript artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub seconds: u32,
    pub text: String,
}
