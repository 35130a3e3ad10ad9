//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output position in whole seconds.
    pub fn out_time_secs(&self) -> u64 {
        (self.out_time_ms.max(0) / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_time_secs() {
        let progress = FfmpegProgress {
            out_time_ms: 65_400,
            ..Default::default()
        };
        assert_eq!(progress.out_time_secs(), 65);
        assert_eq!(FfmpegProgress::default().out_time_secs(), 0);
    }
}
