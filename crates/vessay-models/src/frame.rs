//! Sampled video frames.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timestamp::format_mmss;

/// Default seconds between sampled frames.
pub const DEFAULT_FRAME_INTERVAL_SECS: u32 = 5;

/// One image produced by fixed-interval sampling.
///
/// Ordinals start at 1, matching the transcoder's output numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledFrame {
    pub ordinal: u32,
    pub timestamp_secs: u32,
    pub path: PathBuf,
}

impl SampledFrame {
    pub fn new(ordinal: u32, interval_secs: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            ordinal,
            timestamp_secs: timestamp_for_ordinal(ordinal, interval_secs),
            path: path.into(),
        }
    }

    /// File name of the frame image (`frame_0007.jpg`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| frame_file_name(self.ordinal))
    }

    /// Timestamp rendered as `MM:SS`.
    pub fn timestamp_label(&self) -> String {
        format_mmss(self.timestamp_secs)
    }
}

/// Derived timestamp of a 1-based ordinal: `(ordinal - 1) * interval`.
pub fn timestamp_for_ordinal(ordinal: u32, interval_secs: u32) -> u32 {
    ordinal.saturating_sub(1) * interval_secs
}

/// Canonical file name for a sampled frame.
pub fn frame_file_name(ordinal: u32) -> String {
    format!("frame_{:04}.jpg", ordinal)
}

/// Output pattern handed to the transcoder for a frame directory.
pub fn frame_output_pattern(dir: &Path) -> PathBuf {
    dir.join("frame_%04d.jpg")
}

/// Recover the ordinal from a `frame_NNNN.jpg` style name.
pub fn parse_frame_ordinal(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_prefix("frame_")?;
    let digits = stem.split_once('.').map(|(d, _)| d).unwrap_or(stem);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_for_ordinal() {
        for k in 1..=24 {
            assert_eq!(timestamp_for_ordinal(k, 5), (k - 1) * 5);
        }
        assert_eq!(timestamp_for_ordinal(0, 5), 0);
    }

    #[test]
    fn test_frame_names() {
        assert_eq!(frame_file_name(7), "frame_0007.jpg");
        assert_eq!(parse_frame_ordinal("frame_0007.jpg"), Some(7));
        assert_eq!(parse_frame_ordinal("frame_12345.jpg"), Some(12345));
        assert_eq!(parse_frame_ordinal("thumb_0001.jpg"), None);
        assert_eq!(parse_frame_ordinal("frame_.jpg"), None);
    }

    #[test]
    fn test_sampled_frame() {
        let frame = SampledFrame::new(14, 5, "/tmp/raw/frame_0014.jpg");
        assert_eq!(frame.timestamp_secs, 65);
        assert_eq!(frame.timestamp_label(), "01:05");
        assert_eq!(frame.file_name(), "frame_0014.jpg");
    }
}
