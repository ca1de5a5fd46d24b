//! Output of the tempo estimator.

use crate::SampleTime;

/// How long without an onset before a BPM estimate is considered stale.
pub const STALE_AFTER_SECS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEstimate {
    pub bpm: Option<f32>,
    pub confidence: f32,
    pub last_updated: SampleTime,
    pub stale: bool,
}

impl Default for BeatEstimate {
    fn default() -> Self {
        Self {
            bpm: None,
            confidence: 0.0,
            last_updated: 0,
            stale: true,
        }
    }
}

impl BeatEstimate {
    /// Recompute `stale` given the current sample time.
    pub fn refresh_staleness(&mut self, now: SampleTime, sample_rate: f32) {
        let elapsed_secs = now.saturating_sub(self.last_updated) as f32 / sample_rate;
        self.stale = elapsed_secs > STALE_AFTER_SECS;
    }
}
