//! Audio track extraction.

use std::path::Path;

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extract the audio track of `video` to an MP3 file.
///
/// The output is written next to `output` under a temporary name and
/// renamed once ffmpeg exits cleanly.
pub async fn extract_audio(runner: &FfmpegRunner, video: &Path, output: &Path) -> MediaResult<()> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let partial = output.with_extension("partial.mp3");
    let cmd = FfmpegCommand::new(video, &partial)
        .no_video()
        .audio_codec("libmp3lame")
        .audio_quality(2);

    info!(video = %video.display(), output = %output.display(), "Extracting audio");
    runner.run(&cmd).await?;
    tokio::fs::rename(&partial, output).await?;

    Ok(())
}
