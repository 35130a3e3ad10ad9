//! Sponsor ranges detected in a video.

use serde::{Deserialize, Serialize};

use crate::timestamp::TimeRange;

/// Default tolerance applied around sponsor ranges when excluding frames.
pub const DEFAULT_SPONSOR_PADDING_SECS: u32 = 5;

/// Promotional interval, persisted as a `[start_seconds, end_seconds]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct SponsorRange(TimeRange);

impl SponsorRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self(TimeRange::new(start, end))
    }

    pub fn start(&self) -> u32 {
        self.0.start
    }

    pub fn end(&self) -> u32 {
        self.0.end
    }

    pub fn range(&self) -> TimeRange {
        self.0
    }

    /// Whether `t` falls inside the range widened by `padding` on both sides.
    pub fn excludes(&self, t: u32, padding: u32) -> bool {
        self.0.contains_padded(t, padding)
    }
}

impl From<(u32, u32)> for SponsorRange {
    fn from((start, end): (u32, u32)) -> Self {
        Self::new(start, end)
    }
}

impl From<SponsorRange> for (u32, u32) {
    fn from(range: SponsorRange) -> Self {
        (range.start(), range.end())
    }
}

/// Whether any range excludes timestamp `t` under `padding`.
pub fn is_sponsored(ranges: &[SponsorRange], t: u32, padding: u32) -> bool {
    ranges.iter().any(|r| r.excludes(t, padding))
}
