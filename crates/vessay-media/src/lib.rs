#![deny(unreachable_patterns)]
//! Media tooling for the essay pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress parsing
//! - yt-dlp downloads, metadata and caption retrieval
//! - Fixed-interval frame sampling behind the [`FrameSampler`] seam
//! - Perceptual fingerprints, sharpness scoring and near-duplicate clustering
//! - Atomic artifact writes

pub mod audio;
pub mod captions;
pub mod command;
pub mod download;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod progress;
pub mod similarity;

pub use audio::extract_audio;
pub use captions::parse_json3;
pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::{find_media_file, YtDlp, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
pub use error::{MediaError, MediaResult};
pub use frames::{list_frames, FfmpegFrameSampler, FrameSampler};
pub use fs_utils::{replace_dir, staging_dir, write_atomic, write_json_atomic};
pub use progress::FfmpegProgress;
pub use similarity::{
    analyze_frame, analyze_frames, cluster, deduplicate, distance, fingerprint,
    select_representative, sharpness, Cluster, Fingerprint, FrameFeatures,
    DEFAULT_HAMMING_THRESHOLD,
};
