//! Video, audio, metadata and caption retrieval using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};
use vessay_models::{CaptionEvent, VideoInfo};

use crate::captions::parse_json3;
use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Default timeout for media downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Timeout for metadata and caption lookups.
const LOOKUP_TIMEOUT_SECS: u64 = 120;

/// Minimum size for a valid cookies file (bytes).
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Extensions yt-dlp uses for in-flight or auxiliary files.
const PARTIAL_EXTENSIONS: [&str; 4] = ["part", "ytdl", "tmp", "temp"];

/// Validate that a cookies file appears to be in Netscape format.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .any(|l| l.split('\t').count() >= 6)
}

/// yt-dlp front end with optional cookie authentication.
#[derive(Debug, Clone)]
pub struct YtDlp {
    cookies: Option<PathBuf>,
    timeout_secs: u64,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TIMEOUT_SECS)
    }
}

impl YtDlp {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            cookies: None,
            timeout_secs,
        }
    }

    /// Use a Netscape cookies file; invalid files are ignored with a warning.
    pub fn with_cookies(mut self, path: Option<PathBuf>) -> Self {
        self.cookies = path.filter(|p| match std::fs::read_to_string(p) {
            Ok(content) if content.len() as u64 >= MIN_COOKIES_FILE_SIZE && is_valid_netscape_cookies(&content) => true,
            Ok(_) => {
                warn!(path = %p.display(), "Cookies file is not in Netscape format, ignoring");
                false
            }
            Err(e) => {
                warn!(path = %p.display(), error = %e, "Cookies file unreadable, ignoring");
                false
            }
        });
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--remote-components".to_string(), "ejs:github".to_string()];
        if let Some(cookies) = &self.cookies {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args
    }

    /// Run yt-dlp and return its raw output, regardless of exit status.
    async fn run_raw(&self, args: Vec<String>, timeout_secs: u64) -> MediaResult<Output> {
        check_ytdlp()?;
        debug!("Running yt-dlp {}", args.join(" "));

        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child).await {
            Ok(output) => Ok(output?),
            Err(_) => {
                warn!("yt-dlp timed out after {} seconds", timeout_secs);
                Err(MediaError::Timeout(timeout_secs))
            }
        }
    }

    /// Run yt-dlp and fail with its diagnostics on a non-zero exit.
    async fn run(&self, args: Vec<String>, timeout_secs: u64, what: &str) -> MediaResult<String> {
        let output = self.run_raw(args, timeout_secs).await?;
        if !output.status.success() {
            return Err(ytdlp_failure(what, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Download the full video into `dir` as `video.<ext>`.
    pub async fn download_video(&self, url: &str, dir: &Path) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let mut args = self.base_args();
        args.push("-o".to_string());
        args.push(dir.join("video.%(ext)s").to_string_lossy().to_string());
        args.push(url.to_string());

        info!(url = %url, dir = %dir.display(), "Downloading video");
        self.run(args, self.timeout_secs, "video download").await?;

        let path = find_media_file(dir, "video")
            .await?
            .ok_or_else(|| MediaError::download_failed("yt-dlp succeeded but no video file was written"))?;

        let size_mb = tokio::fs::metadata(&path).await?.len() as f64 / (1024.0 * 1024.0);
        info!(output = %path.display(), size_mb, "Downloaded video successfully");
        Ok(path)
    }

    /// Download only the audio track into `dir` as `audio.mp3`.
    pub async fn download_audio(&self, url: &str, dir: &Path) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let mut args = self.base_args();
        args.extend(
            ["-x", "--audio-format", "mp3", "--audio-quality", "2", "-o"]
                .into_iter()
                .map(String::from),
        );
        args.push(dir.join("audio.%(ext)s").to_string_lossy().to_string());
        args.push(url.to_string());

        info!(url = %url, "Downloading audio track");
        self.run(args, self.timeout_secs, "audio download").await?;

        let path = dir.join("audio.mp3");
        if !path.exists() {
            return Err(MediaError::download_failed("yt-dlp succeeded but audio.mp3 was not written"));
        }
        Ok(path)
    }

    /// Fetch descriptive metadata without downloading media.
    pub async fn fetch_info(&self, url: &str) -> MediaResult<VideoInfo> {
        let mut args = self.base_args();
        args.extend(["--dump-json", "--skip-download", "--no-playlist"].into_iter().map(String::from));
        args.push(url.to_string());

        let stdout = self.run(args, LOOKUP_TIMEOUT_SECS, "metadata fetch").await?;
        parse_info_json(&stdout)
    }

    /// Fetch English captions (manual or automatic) as caption events.
    pub async fn fetch_captions(&self, url: &str) -> MediaResult<Vec<CaptionEvent>> {
        let tmp = tempfile::tempdir()?;

        let mut args = self.base_args();
        args.extend(
            [
                "--write-auto-subs",
                "--write-subs",
                "--sub-langs",
                "en.*",
                "--sub-format",
                "json3",
                "--skip-download",
                "-o",
            ]
            .into_iter()
            .map(String::from),
        );
        args.push(tmp.path().join("subs").to_string_lossy().to_string());
        args.push(url.to_string());

        // yt-dlp can exit non-zero after writing usable subtitles
        let output = self.run_raw(args, LOOKUP_TIMEOUT_SECS).await?;

        let mut json3_files = Vec::new();
        let mut entries = tokio::fs::read_dir(tmp.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|e| e == "json3") {
                json3_files.push(entry.path());
            }
        }
        json3_files.sort();

        let Some(file) = json3_files.first() else {
            return Err(MediaError::NoCaptions(last_stderr_line(&output)));
        };

        let content = tokio::fs::read_to_string(file).await?;
        let events = parse_json3(&content)?;
        info!(file = %file.display(), events = events.len(), "Fetched captions");
        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

fn parse_info_json(stdout: &str) -> MediaResult<VideoInfo> {
    let info: InfoJson = serde_json::from_str(stdout.trim())?;
    Ok(VideoInfo {
        title: info.title.unwrap_or_default(),
        description: info.description.unwrap_or_default(),
        channel: info.channel.or(info.uploader).unwrap_or_default(),
        duration: info.duration,
    })
}

fn last_stderr_line(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp produced no subtitles")
        .to_string()
}

fn ytdlp_failure(what: &str, output: &Output) -> MediaError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!("yt-dlp stderr: {}", stderr);

    let is_rate_limited = stderr.contains("429")
        || stderr.contains("Too Many Requests")
        || stderr.contains("Sign in to confirm");
    if is_rate_limited {
        warn!("YouTube rate limit detected, consider passing --cookies");
    }

    MediaError::download_failed(format!(
        "yt-dlp {} failed (exit {:?}): {}",
        what,
        output.status.code(),
        last_stderr_line(output)
    ))
}

/// Find a completed `<stem>.<ext>` file in `dir`, ignoring partial downloads.
pub async fn find_media_file(dir: &Path, stem: &str) -> MediaResult<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_stem = path.file_stem().is_some_and(|s| s == stem);
        let is_partial = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(true, |e| PARTIAL_EXTENSIONS.contains(&e));
        if matches_stem && !is_partial && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_netscape_cookie_detection() {
        assert!(is_valid_netscape_cookies("# Netscape HTTP Cookie File\n"));
        assert!(is_valid_netscape_cookies(
            ".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=40000000"
        ));
        assert!(!is_valid_netscape_cookies("{\"cookies\": []}"));
    }

    #[test]
    fn test_parse_info_json_falls_back_to_uploader() {
        let info = parse_info_json(
            r#"{"title": "Rust in 100s", "uploader": "Fireship", "duration": 132.0, "id": "x"}"#,
        )
        .unwrap();
        assert_eq!(info.title, "Rust in 100s");
        assert_eq!(info.channel, "Fireship");
        assert_eq!(info.duration, Some(132.0));
        assert!(info.description.is_empty());
    }

    #[tokio::test]
    async fn test_find_media_file_ignores_partials() {
        let dir = TempDir::new().unwrap();
        assert!(find_media_file(dir.path(), "video").await.unwrap().is_none());

        tokio::fs::write(dir.path().join("video.mp4.part"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("video.part"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("audio.mp3"), b"x").await.unwrap();
        assert!(find_media_file(dir.path(), "video").await.unwrap().is_none());

        tokio::fs::write(dir.path().join("video.webm"), b"x").await.unwrap();
        assert_eq!(
            find_media_file(dir.path(), "video").await.unwrap(),
            Some(dir.path().join("video.webm"))
        );
    }

    #[test]
    fn test_with_cookies_filters_invalid_file() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("cookies.txt");
        std::fs::write(&bad, "nope").unwrap();
        let ytdlp = YtDlp::default().with_cookies(Some(bad));
        assert!(!ytdlp.base_args().contains(&"--cookies".to_string()));

        let good = dir.path().join("good.txt");
        std::fs::write(
            &good,
            "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=40000000\n",
        )
        .unwrap();
        let ytdlp = YtDlp::default().with_cookies(Some(good));
        assert!(ytdlp.base_args().contains(&"--cookies".to_string()));
    }
}
