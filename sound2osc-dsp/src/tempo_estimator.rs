//! Autocorrelation-style BPM tracking from an onset stream: a decaying
//! inter-onset-interval histogram resolved to a tempo, with octave
//! disambiguation against the previous estimate.

use std::collections::VecDeque;

use sound2osc_types::{BeatEstimate, SampleTime};

/// Only onsets within this many seconds of "now" contribute IOI pairs.
const IOI_WINDOW_SECS: f32 = 2.0;

/// Histogram bin width.
const BIN_WIDTH_SECS: f32 = 0.010;

/// Number of recent taps kept for tap-tempo.
const TAP_HISTORY: usize = 4;

pub struct TempoEstimator {
    min_bpm: f32,
    max_bpm: f32,
    sample_rate: f32,
    min_interval_s: f32,
    max_interval_s: f32,
    bin_count: usize,
    histogram: Vec<f32>,
    interval_weight_sum: Vec<f32>,
    recent_onsets: VecDeque<SampleTime>,
    estimate: BeatEstimate,
    locked_bpm: Option<f32>,
    taps: VecDeque<SampleTime>,
}

impl TempoEstimator {
    pub fn new(min_bpm: f32, max_bpm: f32, sample_rate: f32) -> Self {
        let min_interval_s = 60.0 / max_bpm;
        let max_interval_s = 60.0 / min_bpm;
        let bin_count = (((max_interval_s - min_interval_s) / BIN_WIDTH_SECS).ceil() as usize).max(1);
        Self {
            min_bpm,
            max_bpm,
            sample_rate,
            min_interval_s,
            max_interval_s,
            bin_count,
            histogram: vec![0.0; bin_count],
            interval_weight_sum: vec![0.0; bin_count],
            recent_onsets: VecDeque::new(),
            estimate: BeatEstimate::default(),
            locked_bpm: None,
            taps: VecDeque::new(),
        }
    }

    pub fn estimate(&self) -> BeatEstimate {
        self.estimate
    }

    /// Recompute staleness without processing an onset.
    pub fn refresh(&mut self, now: SampleTime) {
        self.estimate.refresh_staleness(now, self.sample_rate);
    }

    /// Feed a newly detected onset.
    pub fn on_onset(&mut self, now: SampleTime) {
        self.purge_expired(now);

        for &prev in self.recent_onsets.iter() {
            let interval_s = (now - prev) as f32 / self.sample_rate;
            if let Some(bin) = self.bin_for_interval(interval_s) {
                let weight = (-interval_s / IOI_WINDOW_SECS).exp();
                self.histogram[bin] += weight;
                self.interval_weight_sum[bin] += weight * interval_s;
            }
        }

        self.recent_onsets.push_back(now);

        self.recompute_estimate(now);
        self.estimate.refresh_staleness(now, self.sample_rate);
    }

    fn purge_expired(&mut self, now: SampleTime) {
        let window_samples = (IOI_WINDOW_SECS * self.sample_rate) as SampleTime;
        while let Some(&front) = self.recent_onsets.front() {
            if now.saturating_sub(front) > window_samples {
                self.recent_onsets.pop_front();
            } else {
                break;
            }
        }
    }

    fn bin_for_interval(&self, interval_s: f32) -> Option<usize> {
        if interval_s < self.min_interval_s || interval_s > self.max_interval_s {
            return None;
        }
        let idx = ((interval_s - self.min_interval_s) / BIN_WIDTH_SECS) as usize;
        Some(idx.min(self.bin_count - 1))
    }

    fn recompute_estimate(&mut self, now: SampleTime) {
        let (best_bin, best_count) = self
            .histogram
            .iter()
            .enumerate()
            .fold((0usize, 0.0f32), |acc, (i, &c)| if c > acc.1 { (i, c) } else { acc });

        if best_count <= 0.0 {
            return;
        }

        // Bin membership only locates the neighborhood; resolving to the bin's
        // midpoint would bake in up to half a bin width of interval error. Take
        // the weighted mean of the actual IOIs that landed in the peak bin and
        // its immediate neighbors instead.
        let lo = best_bin.saturating_sub(1);
        let hi = (best_bin + 1).min(self.bin_count - 1);
        let weight_sum: f32 = self.histogram[lo..=hi].iter().sum();
        let interval_sum: f32 = self.interval_weight_sum[lo..=hi].iter().sum();
        let candidate_interval = if weight_sum > 0.0 {
            interval_sum / weight_sum
        } else {
            self.min_interval_s + (best_bin as f32 + 0.5) * BIN_WIDTH_SECS
        };
        let candidate_bpm = 60.0 / candidate_interval;

        let chosen_bpm = self.resolve_octave(candidate_bpm);

        let total: f32 = self.histogram.iter().sum();
        let confidence = if total > 0.0 { (best_count / total).clamp(0.0, 1.0) } else { 0.0 };

        let new_bpm = match self.estimate.bpm {
            Some(old) if (chosen_bpm - old).abs() / old <= 0.05 => 0.7 * old + 0.3 * chosen_bpm,
            _ => chosen_bpm,
        };

        self.estimate.bpm = Some(new_bpm);
        self.estimate.confidence = confidence;
        self.estimate.last_updated = now;
        self.locked_bpm = Some(new_bpm);
    }

    /// Pick the {½×, 1×, 2×} variant of `candidate_bpm` closest to the previously
    /// locked estimate, clamped to the configured range.
    fn resolve_octave(&self, candidate_bpm: f32) -> f32 {
        let Some(locked) = self.locked_bpm else {
            return candidate_bpm.clamp(self.min_bpm, self.max_bpm);
        };
        [candidate_bpm * 0.5, candidate_bpm, candidate_bpm * 2.0]
            .into_iter()
            .filter(|bpm| *bpm >= self.min_bpm && *bpm <= self.max_bpm)
            .min_by(|a, b| {
                (a - locked)
                    .abs()
                    .partial_cmp(&(b - locked).abs())
                    .unwrap()
            })
            .unwrap_or_else(|| candidate_bpm.clamp(self.min_bpm, self.max_bpm))
    }

    /// Tap-tempo override: each tap pushes a timestamp; once two or more taps
    /// are present the median inter-tap interval becomes a direct BPM override
    /// with full confidence.
    pub fn tap(&mut self, now: SampleTime) {
        self.taps.push_back(now);
        if self.taps.len() > TAP_HISTORY {
            self.taps.pop_front();
        }
        if self.taps.len() < 2 {
            return;
        }
        let mut intervals: Vec<f32> = self
            .taps
            .iter()
            .zip(self.taps.iter().skip(1))
            .map(|(a, b)| (b - a) as f32 / self.sample_rate)
            .collect();
        intervals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = intervals[intervals.len() / 2];
        if median <= 0.0 {
            return;
        }
        let bpm = (60.0 / median).clamp(self.min_bpm, self.max_bpm);
        self.estimate.bpm = Some(bpm);
        self.estimate.confidence = 1.0;
        self.estimate.last_updated = now;
        self.locked_bpm = Some(bpm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_interval_onset_train_converges_within_tolerance() {
        let sample_rate = 1_000.0; // simplified clock for fast, exact math
        let mut estimator = TempoEstimator::new(75.0, 200.0, sample_rate);
        let period_s = 0.5; // 120 BPM
        let period_samples = (period_s * sample_rate) as SampleTime;

        let mut now: SampleTime = 0;
        for _ in 0..8 {
            now += period_samples;
            estimator.on_onset(now);
        }

        let bpm = estimator.estimate().bpm.expect("bpm should be estimated");
        assert!((bpm - 120.0).abs() <= 1.0, "bpm={}", bpm);
    }

    #[test]
    fn stale_after_five_seconds_without_onsets() {
        let sample_rate = 1_000.0;
        let mut estimator = TempoEstimator::new(75.0, 200.0, sample_rate);
        estimator.on_onset(0);
        estimator.on_onset(500);
        estimator.refresh(6_000);
        assert!(estimator.estimate().stale);
    }

    #[test]
    fn tap_tempo_overrides_with_full_confidence() {
        let sample_rate = 1_000.0;
        let mut estimator = TempoEstimator::new(75.0, 200.0, sample_rate);
        estimator.tap(0);
        estimator.tap(500);
        estimator.tap(1000);
        let est = estimator.estimate();
        assert_eq!(est.confidence, 1.0);
        assert!((est.bpm.unwrap() - 120.0).abs() < 1e-3);
    }
}
