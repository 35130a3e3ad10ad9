//! Video identifier extraction.
//!
//! Every run is keyed by the 11-character YouTube video id, so commands
//! accept either a full URL or the bare id.

use thiserror::Error;

/// Errors that can occur during video ID extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoIdError {
    #[error("Input is neither a YouTube URL nor a video id: {0}")]
    Unrecognized(String),

    #[error("Video ID has invalid format: {0}")]
    InvalidVideoId(String),

    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Result type for video ID extraction.
pub type VideoIdResult<T> = Result<T, VideoIdError>;

const ID_LEN: usize = 11;

/// Extract the YouTube video id from a URL or bare id.
///
/// Supports:
/// - https://youtube.com/watch?v=VIDEO_ID
/// - https://youtu.be/VIDEO_ID
/// - https://youtube.com/embed/VIDEO_ID
/// - https://youtube.com/v/VIDEO_ID
/// - https://youtube.com/shorts/VIDEO_ID
/// - VIDEO_ID
pub fn extract_video_id(input: &str) -> VideoIdResult<String> {
    let input = input.trim();

    if is_valid_video_id(input) {
        return Ok(input.to_string());
    }

    if !is_youtube_domain(input) {
        return Err(VideoIdError::Unrecognized(input.to_string()));
    }

    let candidate = ["?v=", "&v=", "youtu.be/", "/embed/", "/v/", "/shorts/"]
        .iter()
        .find_map(|marker| segment_after(input, marker));

    match candidate {
        Some(id) if is_valid_video_id(&id) => Ok(id),
        Some(id) if !id.is_empty() => Err(VideoIdError::InvalidVideoId(id)),
        _ => Err(VideoIdError::VideoIdNotFound),
    }
}

/// Check if URL is from a YouTube domain
fn is_youtube_domain(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Return the id-shaped segment following `marker`, if the marker is present.
fn segment_after(url: &str, marker: &str) -> Option<String> {
    let start = url.find(marker)? + marker.len();
    let remaining = &url[start..];
    let end = remaining
        .find(['&', '#', '?', '/'])
        .unwrap_or(remaining.len());
    Some(remaining[..end].trim().to_string())
}

/// Whether `s` is exactly eleven URL-safe id characters.
pub fn is_valid_video_id(s: &str) -> bool {
    s.len() == ID_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_url_forms() {
        for url in [
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLrAXtmRdnEQy4qtr",
            "https://youtu.be/dQw4w9WgXcQ?t=30",
            "https://youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/v/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "  https://YOUTUBE.COM/watch?v=dQw4w9WgXcQ  ",
        ] {
            assert_eq!(extract_video_id(url).unwrap(), "dQw4w9WgXcQ", "{url}");
        }
    }

    #[test]
    fn test_extract_video_id_bare() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id("a-b_c1234XY").unwrap(), "a-b_c1234XY");
    }

    #[test]
    fn test_extract_video_id_errors() {
        assert!(matches!(
            extract_video_id("https://vimeo.com/123"),
            Err(VideoIdError::Unrecognized(_))
        ));
        assert!(matches!(
            extract_video_id("https://youtube.com"),
            Err(VideoIdError::VideoIdNotFound)
        ));
        assert!(matches!(
            extract_video_id("https://youtube.com/watch?v=abc123"),
            Err(VideoIdError::InvalidVideoId(_))
        ));
        assert!(matches!(
            extract_video_id("https://youtube.com/watch?v="),
            Err(VideoIdError::VideoIdNotFound)
        ));
    }
}
