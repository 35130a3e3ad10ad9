//! Shared data models for the video essay pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Timestamps and time ranges
//! - Video ids, video info and run metadata
//! - Sampled frames and their classifications
//! - Sponsor ranges
//! - Transcript fragments and essay scores

pub mod classification;
pub mod frame;
pub mod score;
pub mod sponsor;
pub mod timestamp;
pub mod transcript;
pub mod utils;
pub mod video;

// Re-export common types
pub use classification::{Classification, FrameCategory, FrameFilter, FrameJudgment, DEFAULT_MIN_VALUE};
pub use frame::{
    frame_file_name, frame_output_pattern, parse_frame_ordinal, timestamp_for_ordinal, SampledFrame,
    DEFAULT_FRAME_INTERVAL_SECS,
};
pub use score::{DimensionScore, ScoreDimension, ScoreReport, TopicShare, Violation};
pub use sponsor::{is_sponsored, SponsorRange, DEFAULT_SPONSOR_PADDING_SECS};
pub use timestamp::{format_mmss, mmss_to_secs, parse_mmss, TimeRange};
pub use transcript::{CaptionEvent, TranscriptEntry, Utterance};
pub use utils::{extract_video_id, is_valid_video_id, VideoIdError, VideoIdResult};
pub use video::{RunMetadata, VideoId, VideoInfo};
