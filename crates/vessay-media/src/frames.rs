//! Fixed-interval frame sampling.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};
use vessay_models::{frame_output_pattern, parse_frame_ordinal, SampledFrame};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Source of sampled frames for a video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Sample one frame every `interval_secs` into `out_dir`, in ordinal order.
    async fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        interval_secs: u32,
    ) -> MediaResult<Vec<SampledFrame>>;
}

/// Frame sampler backed by the `ffmpeg` fps filter.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameSampler {
    runner: FfmpegRunner,
}

impl FfmpegFrameSampler {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        interval_secs: u32,
    ) -> MediaResult<Vec<SampledFrame>> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        if interval_secs == 0 {
            return Err(MediaError::internal("frame interval must be at least 1 second"));
        }

        clear_frames(out_dir).await?;

        let cmd = FfmpegCommand::new(video, frame_output_pattern(out_dir))
            .video_filter(format!("fps=1/{}", interval_secs))
            .video_quality(2);

        info!(
            video = %video.display(),
            interval_secs,
            "Sampling frames"
        );

        self.runner
            .run_with_progress(&cmd, |p| {
                debug!(frame = p.frame, out_time_secs = p.out_time_secs(), "Sampling progress");
            })
            .await?;

        let frames = list_frames(out_dir, interval_secs).await?;
        info!(count = frames.len(), "Sampled frames");
        Ok(frames)
    }
}

/// List `frame_NNNN.jpg` files in a directory, ordered by ordinal.
pub async fn list_frames(dir: &Path, interval_secs: u32) -> MediaResult<Vec<SampledFrame>> {
    let mut frames = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".jpg") {
            continue;
        }
        if let Some(ordinal) = parse_frame_ordinal(name) {
            frames.push(SampledFrame::new(ordinal, interval_secs, entry.path()));
        }
    }
    frames.sort_by_key(|f| f.ordinal);
    Ok(frames)
}

/// Remove stale frames left by an earlier sampling pass.
async fn clear_frames(dir: &Path) -> MediaResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).await?;
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_frames_orders_by_ordinal() {
        let dir = TempDir::new().unwrap();
        for name in ["frame_0010.jpg", "frame_0002.jpg", "frame_0001.jpg", "notes.txt", "frame_0003.png"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let frames = list_frames(dir.path(), 5).await.unwrap();
        let ordinals: Vec<u32> = frames.iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 10]);
        assert_eq!(frames[2].timestamp_secs, 45);
    }

    #[tokio::test]
    async fn test_sample_rejects_missing_video() {
        let dir = TempDir::new().unwrap();
        let sampler = FfmpegFrameSampler::default();
        let err = sampler
            .sample(&dir.path().join("missing.mp4"), &dir.path().join("raw"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
