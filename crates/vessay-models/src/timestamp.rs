//! Timestamp parsing, formatting and time-range utilities.
//!
//! Transcripts, sponsor segments and frame records all carry `MM:SS`
//! timestamps. Minutes are not capped at 59, so a two-hour video yields
//! `[119:59]` rather than switching to an hours component.

use serde::{Deserialize, Serialize};

/// Total seconds for a minutes/seconds pair, or `None` on overflow.
pub fn mmss_to_secs(minutes: u32, seconds: u32) -> Option<u32> {
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Parse a strict `M:SS` / `MM:SS` timestamp into whole seconds.
///
/// Returns `None` for anything that is not digits, a colon and exactly two
/// second digits, and for values that do not fit in a `u32`.
pub fn parse_mmss(ts: &str) -> Option<u32> {
    let (minutes, seconds) = ts.trim().split_once(':')?;
    if minutes.is_empty()
        || seconds.len() != 2
        || !minutes.bytes().all(|b| b.is_ascii_digit())
        || !seconds.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    mmss_to_secs(minutes.parse().ok()?, seconds.parse().ok()?)
}

/// Format whole seconds as `MM:SS`.
pub fn format_mmss(total_secs: u32) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Closed time interval `[start, end]` in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Whether `t` lies within `[start - padding, end + padding]`.
    pub fn contains_padded(&self, t: u32, padding: u32) -> bool {
        self.start.saturating_sub(padding) <= t && t <= self.end.saturating_add(padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mmss() {
        assert_eq!(parse_mmss("00:00"), Some(0));
        assert_eq!(parse_mmss("1:05"), Some(65));
        assert_eq!(parse_mmss("125:00"), Some(7500));
        assert_eq!(parse_mmss("1:5"), None);
        assert_eq!(parse_mmss("ab:cd"), None);
        assert_eq!(parse_mmss("90"), None);
    }

    #[test]
    fn test_parse_mmss_rejects_overflow() {
        assert_eq!(parse_mmss("80000000:00"), None);
        assert_eq!(parse_mmss("99999999999:00"), None);
        assert_eq!(parse_mmss("71582788:15"), Some(u32::MAX));
        assert_eq!(mmss_to_secs(71582788, 16), None);
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(65), "01:05");
        assert_eq!(format_mmss(7500), "125:00");
        assert_eq!(parse_mmss(&format_mmss(754)), Some(754));
    }

    #[test]
    fn test_range_padding() {
        let range = TimeRange::new(60, 90);
        assert!(range.contains_padded(92, 5));
        assert!(range.contains_padded(55, 5));
        assert!(!range.contains_padded(96, 5));
        assert!(!range.contains_padded(54, 5));
        assert!(!range.contains_padded(92, 0));

        // Padding near zero saturates instead of underflowing.
        assert!(TimeRange::new(2, 10).contains_padded(0, 5));
        assert!(TimeRange::new(u32::MAX - 1, u32::MAX).contains_padded(u32::MAX, 5));
        assert_eq!(TimeRange::new(9, 3), TimeRange::new(3, 9));
    }
}
