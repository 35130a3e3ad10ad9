//! Run directory layout and artifact presence checks.
//!
//! The run directory is the pipeline's only checkpoint: a step is complete
//! exactly when its artifact exists. All text and JSON artifacts are written
//! through [`vessay_media::write_atomic`] so a partial write is never visible.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use vessay_media::{find_media_file, write_json_atomic};
use vessay_models::{RunMetadata, SponsorRange, VideoId};

use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::StepName;

/// Paths of every file a run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    root: PathBuf,
    video_id: VideoId,
}

impl RunDir {
    /// Run directory `<runs_dir>/<video_id>`.
    pub fn new(runs_dir: impl AsRef<Path>, video_id: VideoId) -> Self {
        Self {
            root: runs_dir.as_ref().join(video_id.as_str()),
            video_id,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub async fn ensure(&self) -> PipelineResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    pub fn video_info(&self) -> PathBuf {
        self.root.join("video_info.json")
    }

    pub fn audio(&self) -> PathBuf {
        self.root.join("audio.mp3")
    }

    pub fn diarization(&self) -> PathBuf {
        self.root.join("diarization.json")
    }

    pub fn speaker_map(&self) -> PathBuf {
        self.root.join("speaker_map.json")
    }

    pub fn transcript(&self) -> PathBuf {
        self.root.join("transcript.txt")
    }

    pub fn transcript_clean(&self) -> PathBuf {
        self.root.join("transcript_clean.txt")
    }

    pub fn sponsors(&self) -> PathBuf {
        self.root.join("sponsors.json")
    }

    pub fn essay(&self) -> PathBuf {
        self.root.join("essay.md")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn raw_frames_dir(&self) -> PathBuf {
        self.frames_dir().join("raw")
    }

    pub fn kept_frames_dir(&self) -> PathBuf {
        self.frames_dir().join("kept")
    }

    pub fn classifications(&self) -> PathBuf {
        self.frames_dir().join("classifications.json")
    }

    pub fn essay_with_images(&self) -> PathBuf {
        self.root.join("essay_with_images.md")
    }

    pub fn essay_final(&self) -> PathBuf {
        self.root.join("essay_final.md")
    }

    pub fn score(&self) -> PathBuf {
        self.root.join("score.json")
    }

    /// Completion artifact of `step`; `None` for the download step, whose
    /// file extension is chosen by the downloader.
    pub fn artifact_path(&self, step: StepName) -> Option<PathBuf> {
        match step {
            StepName::Transcript => Some(self.transcript()),
            StepName::SponsorFilter => Some(self.sponsors()),
            StepName::Essay => Some(self.essay()),
            StepName::Download => None,
            StepName::ExtractFrames => Some(self.classifications()),
            StepName::PlaceImages => Some(self.essay_final()),
            StepName::Score => Some(self.score()),
        }
    }

    /// Downloaded `video.<ext>`, ignoring partial downloads.
    pub async fn find_video(&self) -> PipelineResult<Option<PathBuf>> {
        Ok(find_media_file(&self.root, "video").await?)
    }

    /// Read a text artifact another step must already have produced.
    pub async fn read_required(&self, path: &Path, producer: StepName) -> PipelineResult<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PipelineError::missing_precondition(
                format!("{} not found; run the {} step first", path.display(), producer),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and parse an optional JSON file; `None` when absent.
    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> PipelineResult<Option<T>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The sponsor-free transcript when present, else the raw one.
    pub async fn preferred_transcript(&self) -> PipelineResult<String> {
        let clean = self.transcript_clean();
        if clean.exists() {
            debug!(path = %clean.display(), "Using sponsor-filtered transcript");
            return Ok(tokio::fs::read_to_string(&clean).await?);
        }
        self.read_required(&self.transcript(), StepName::Transcript).await
    }

    /// Sponsor ranges found for this run; empty when none were detected.
    pub async fn sponsor_ranges(&self) -> PipelineResult<Vec<SponsorRange>> {
        Ok(self.read_json(&self.sponsors()).await?.unwrap_or_default())
    }

    /// Write `metadata.json` unless an earlier invocation already did.
    pub async fn record_metadata(&self, url: &str) -> PipelineResult<()> {
        let path = self.metadata();
        if path.exists() {
            return Ok(());
        }
        self.ensure().await?;
        write_json_atomic(&path, &RunMetadata::new(url, self.video_id.clone())).await?;
        Ok(())
    }
}

/// Step-completion query backed by wherever artifacts live.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, run: &RunDir, step: StepName) -> bool;
}

/// Artifact store over the local run directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, run: &RunDir, step: StepName) -> bool {
        match run.artifact_path(step) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => matches!(run.find_video().await, Ok(Some(_))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_in(dir: &TempDir) -> RunDir {
        RunDir::new(dir.path(), VideoId::parse("dQw4w9WgXcQ").unwrap())
    }

    #[tokio::test]
    async fn test_fs_store_tracks_artifacts() {
        let dir = TempDir::new().unwrap();
        let run = run_in(&dir);
        run.ensure().await.unwrap();
        let store = FsArtifactStore;

        assert!(!store.exists(&run, StepName::Transcript).await);
        tokio::fs::write(run.transcript(), "[00:00] hi").await.unwrap();
        assert!(store.exists(&run, StepName::Transcript).await);

        tokio::fs::write(run.root().join("video.mp4.part"), b"x").await.unwrap();
        assert!(!store.exists(&run, StepName::Download).await);
        tokio::fs::write(run.root().join("video.mp4"), b"x").await.unwrap();
        assert!(store.exists(&run, StepName::Download).await);

        // Kept frames alone do not complete frame extraction
        tokio::fs::create_dir_all(run.kept_frames_dir()).await.unwrap();
        assert!(!store.exists(&run, StepName::ExtractFrames).await);
    }

    #[tokio::test]
    async fn test_preferred_transcript() {
        let dir = TempDir::new().unwrap();
        let run = run_in(&dir);
        run.ensure().await.unwrap();

        let err = run.preferred_transcript().await.unwrap_err();
        assert!(err.is_missing_precondition());

        tokio::fs::write(run.transcript(), "raw").await.unwrap();
        assert_eq!(run.preferred_transcript().await.unwrap(), "raw");

        tokio::fs::write(run.transcript_clean(), "clean").await.unwrap();
        assert_eq!(run.preferred_transcript().await.unwrap(), "clean");
    }

    #[tokio::test]
    async fn test_record_metadata_once() {
        let dir = TempDir::new().unwrap();
        let run = run_in(&dir);

        run.record_metadata("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        run.record_metadata("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await.unwrap();

        let meta: RunMetadata = run.read_json(&run.metadata()).await.unwrap().unwrap();
        assert_eq!(meta.url, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(meta.video_id.as_str(), "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_sponsor_ranges_default_empty() {
        let dir = TempDir::new().unwrap();
        let run = run_in(&dir);
        assert!(run.sponsor_ranges().await.unwrap().is_empty());

        run.ensure().await.unwrap();
        tokio::fs::write(run.sponsors(), "[[60, 90]]").await.unwrap();
        let ranges = run.sponsor_ranges().await.unwrap();
        assert_eq!(ranges, vec![SponsorRange::new(60, 90)]);
    }
}
