//! Video and run metadata models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{extract_video_id, VideoIdResult};

/// Stable identifier of a run (the source video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a URL or bare id into a validated video id.
    pub fn parse(input: &str) -> VideoIdResult<Self> {
        extract_video_id(input).map(Self)
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this id.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive metadata scraped for a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel: String,
    /// Duration in seconds, when the source reports one
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Provenance record written once when a run is first created from a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub url: String,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(url: impl Into<String>, video_id: VideoId) -> Self {
        Self {
            url: url.into(),
            video_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_parse_and_url() {
        let id = VideoId::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(VideoId::parse("not a video").is_err());
    }

    #[test]
    fn test_run_metadata_serializes_id_as_string() {
        let meta = RunMetadata::new("https://youtu.be/dQw4w9WgXcQ", VideoId::parse("dQw4w9WgXcQ").unwrap());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["video_id"], "dQw4w9WgXcQ");
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn test_video_info_tolerates_missing_fields() {
        let info: VideoInfo = serde_json::from_str(r#"{"title": "Talk"}"#).unwrap();
        assert_eq!(info.title, "Talk");
        assert!(info.duration.is_none());
    }
}
