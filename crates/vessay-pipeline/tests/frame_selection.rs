//! Frame selection against a synthetic video.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{GrayImage, Luma};
use tempfile::TempDir;
use vessay_client::{ClientResult, LanguageModel, MessageRequest, MessageResponse};
use vessay_media::{FrameSampler, MediaResult};
use vessay_models::{Classification, FrameFilter, SampledFrame, SponsorRange, TranscriptEntry, VideoId};
use vessay_pipeline::{FrameSelector, PipelineError, RunDir, SelectionConfig};

const INTERVAL: u32 = 5;
const FRAMES: u32 = 24;

/// Writes `count` frames where frames 2k-1 and 2k share the same image.
struct SyntheticSampler {
    count: u32,
    corrupt: bool,
}

fn render(pattern: u32) -> GrayImage {
    let period = 2 + pattern * 3;
    GrayImage::from_fn(128, 96, |x, y| {
        let band = if pattern % 2 == 0 { x } else { y };
        let offset = (x * pattern + y) / 40;
        if ((band / period) + offset) % 2 == 0 {
            Luma([30])
        } else {
            Luma([220])
        }
    })
}

#[async_trait]
impl FrameSampler for SyntheticSampler {
    async fn sample(&self, _video: &Path, out_dir: &Path, interval_secs: u32) -> MediaResult<Vec<SampledFrame>> {
        std::fs::create_dir_all(out_dir)?;
        let mut frames = Vec::new();
        for ordinal in 1..=self.count {
            let path = out_dir.join(format!("frame_{:04}.jpg", ordinal));
            if self.corrupt {
                std::fs::write(&path, b"not a jpeg")?;
            } else {
                render((ordinal - 1) / 2)
                    .save(&path)
                    .map_err(|e| vessay_media::MediaError::internal(e.to_string()))?;
            }
            frames.push(SampledFrame::new(ordinal, interval_secs, path));
        }
        Ok(frames)
    }
}

/// Cycles through a fixed set of classification replies.
#[derive(Default)]
struct CyclingJudge {
    calls: AtomicUsize,
}

const REPLIES: [&str; 4] = [
    r#"{"category": "chart", "value": 4, "description": "Bar chart of results"}"#,
    r#"{"category": "talking_head", "value": 5, "description": "Host on camera"}"#,
    "```json\n{\"category\": \"slide\", \"value\": 2, \"description\": \"Title slide\"}\n```",
    "I cannot tell what this is.",
];

#[async_trait]
impl LanguageModel for CyclingJudge {
    async fn create_message(&self, _request: &MessageRequest) -> ClientResult<MessageResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MessageResponse::from_text(REPLIES[n % REPLIES.len()]))
    }
}

fn run_in(dir: &TempDir) -> RunDir {
    RunDir::new(dir.path(), VideoId::parse("dQw4w9WgXcQ").unwrap())
}

fn selector(sampler: SyntheticSampler, judge: Arc<CyclingJudge>) -> FrameSelector {
    let config = SelectionConfig {
        interval_secs: INTERVAL,
        ..Default::default()
    };
    FrameSelector::new(Arc::new(sampler), judge, "fast-model", config)
}

fn transcript() -> Vec<TranscriptEntry> {
    (0..FRAMES)
        .map(|i| TranscriptEntry {
            seconds: i * INTERVAL,
            text: format!("point number {}", i),
        })
        .collect()
}

#[tokio::test]
async fn test_selection_end_to_end() {
    let dir = TempDir::new().unwrap();
    let run = run_in(&dir);
    run.ensure().await.unwrap();

    let judge = Arc::new(CyclingJudge::default());
    let selector = selector(
        SyntheticSampler {
            count: FRAMES,
            corrupt: false,
        },
        Arc::clone(&judge),
    );
    let sponsors = [SponsorRange::new(30, 40)];

    let report = selector
        .select(Path::new("video.mp4"), &run, &transcript(), &sponsors)
        .await
        .unwrap();

    // Timestamps 25..=45 fall inside the padded sponsor range
    assert_eq!(report.sampled, 24);
    assert_eq!(report.after_sponsor_filter, 19);

    // Each duplicate pair collapses to its earlier frame; distinct patterns stay apart
    assert_eq!(report.unique, 10);
    let frames: Vec<&str> = report.classifications.iter().map(|c| c.frame.as_str()).collect();
    assert_eq!(
        frames,
        vec![
            "frame_0001.jpg",
            "frame_0003.jpg",
            "frame_0005.jpg",
            "frame_0011.jpg",
            "frame_0013.jpg",
            "frame_0015.jpg",
            "frame_0017.jpg",
            "frame_0019.jpg",
            "frame_0021.jpg",
            "frame_0023.jpg",
        ]
    );
    assert_eq!(judge.calls.load(Ordering::SeqCst), report.unique);

    for c in &report.classifications {
        let t = c.timestamp_secs();
        assert!(!(25..=45).contains(&t), "sponsored frame {} classified", c.frame);
    }
    let timestamps: Vec<u32> = report.classifications.iter().map(|c| c.timestamp_secs()).collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));

    // Only the chart replies (every fourth call) pass the default filter
    let kept: Vec<&str> = report.kept.iter().map(|c| c.frame.as_str()).collect();
    assert_eq!(kept, vec!["frame_0001.jpg", "frame_0013.jpg", "frame_0021.jpg"]);

    let filter = FrameFilter::default();
    for kept in &report.kept {
        assert!(report.classifications.contains(kept));
        assert!(kept.value() >= filter.min_value);
        assert!(!filter.skip.contains(&kept.category()));
        assert!(run.kept_frames_dir().join(&kept.frame).exists());
    }

    let kept_files = std::fs::read_dir(run.kept_frames_dir()).unwrap().count();
    assert_eq!(kept_files, report.kept.len());

    let json = std::fs::read_to_string(run.classifications()).unwrap();
    let persisted: Vec<Classification> = serde_json::from_str(&json).unwrap();
    assert_eq!(persisted, report.classifications);
}

#[tokio::test]
async fn test_rerun_replaces_kept_frames() {
    let dir = TempDir::new().unwrap();
    let run = run_in(&dir);
    run.ensure().await.unwrap();

    std::fs::create_dir_all(run.kept_frames_dir()).unwrap();
    std::fs::write(run.kept_frames_dir().join("frame_9999.jpg"), b"stale").unwrap();

    let selector = selector(
        SyntheticSampler {
            count: 6,
            corrupt: false,
        },
        Arc::new(CyclingJudge::default()),
    );
    let report = selector.select(Path::new("video.mp4"), &run, &[], &[]).await.unwrap();

    assert!(!run.kept_frames_dir().join("frame_9999.jpg").exists());
    let kept_files = std::fs::read_dir(run.kept_frames_dir()).unwrap().count();
    assert_eq!(kept_files, report.kept.len());
}

#[tokio::test]
async fn test_undecodable_frames_fail_without_marker() {
    let dir = TempDir::new().unwrap();
    let run = run_in(&dir);
    run.ensure().await.unwrap();

    let judge = Arc::new(CyclingJudge::default());
    let selector = selector(
        SyntheticSampler {
            count: 3,
            corrupt: true,
        },
        Arc::clone(&judge),
    );
    let err = selector
        .select(Path::new("video.mp4"), &run, &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Media(_)));
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    assert!(!run.classifications().exists());
}
