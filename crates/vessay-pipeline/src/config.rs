//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vessay_client::RetryConfig;
use vessay_models::{FrameFilter, DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_SPONSOR_PADDING_SECS};

pub const DEFAULT_FAST_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_WRITER_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Frame sampling and selection knobs.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Seconds between sampled frames
    pub interval_secs: u32,
    /// Maximum Hamming distance for two frames to be near-duplicates
    pub hamming_threshold: u32,
    /// Transcript context gathered on each side of a frame
    pub context_window_secs: u32,
    /// Tolerance around sponsor ranges when dropping frames
    pub sponsor_padding_secs: u32,
    pub filter: FrameFilter,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_FRAME_INTERVAL_SECS,
            hamming_threshold: vessay_media::DEFAULT_HAMMING_THRESHOLD,
            context_window_secs: 15,
            sponsor_padding_secs: DEFAULT_SPONSOR_PADDING_SECS,
            filter: FrameFilter::default(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding one sub-directory per run
    pub runs_dir: PathBuf,
    pub anthropic_api_key: Option<String>,
    /// Absent key selects the caption fallback for transcripts
    pub deepgram_api_key: Option<String>,
    /// Model for classification, sponsor detection and profiling
    pub fast_model: String,
    /// Model for essay writing, placement, annotation and scoring
    pub writer_model: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub download_timeout: Duration,
    pub ffmpeg_timeout: Duration,
    pub http_timeout: Duration,
    /// Netscape cookies file passed to yt-dlp
    pub cookies: Option<PathBuf>,
    /// Inline images as data URIs in the final essay
    pub embed_images: bool,
    /// Concurrent scoring calls
    pub score_concurrency: usize,
    pub selection: SelectionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("runs"),
            anthropic_api_key: None,
            deepgram_api_key: None,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            writer_model: DEFAULT_WRITER_MODEL.to_string(),
            retry_max_attempts: vessay_client::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: vessay_client::DEFAULT_BASE_DELAY,
            download_timeout: Duration::from_secs(600),
            ffmpeg_timeout: Duration::from_secs(1800),
            http_timeout: Duration::from_secs(600),
            cookies: None,
            embed_images: true,
            score_concurrency: 5,
            selection: SelectionConfig::default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            runs_dir: std::env::var("VESSAY_RUNS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.runs_dir),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            deepgram_api_key: non_empty_var("DEEPGRAM_API_KEY"),
            fast_model: non_empty_var("VESSAY_FAST_MODEL").unwrap_or(defaults.fast_model),
            writer_model: non_empty_var("VESSAY_WRITER_MODEL").unwrap_or(defaults.writer_model),
            retry_max_attempts: std::env::var("VESSAY_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_max_attempts),
            retry_base_delay: Duration::from_secs(
                std::env::var("VESSAY_RETRY_BASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
            download_timeout: Duration::from_secs(
                std::env::var("VESSAY_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("VESSAY_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            http_timeout: Duration::from_secs(
                std::env::var("VESSAY_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            ..defaults
        }
    }

    /// Retry policy shared by every network collaborator.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new("pipeline")
            .with_max_attempts(self.retry_max_attempts)
            .with_base_delay(self.retry_base_delay)
    }
}
