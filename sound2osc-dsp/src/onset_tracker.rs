//! Spectral-flux onset detection over the bass-to-low-mid sub-range.

use std::collections::VecDeque;

use sound2osc_types::SampleTime;

use crate::scaled_spectrum::ScaledSpectrum;

/// Onset history retains at most this many `(sample_time, flux)` entries —
/// roughly 23 s of history at a 44 Hz tick rate.
pub const HISTORY_CAPACITY: usize = 1_024;

/// Local mean/std window for the adaptive onset threshold, about 1 s of ticks.
const LOCAL_STATS_WINDOW: usize = 43;

/// One-pole IIR coefficient applied to the new flux sample.
const FLUX_SMOOTHING: f32 = 0.2;

const ONSET_SIGMA_MULT: f32 = 1.5;

/// Upper edge of the bass-to-low-mid sub-range used for flux.
const FLUX_RANGE_UPPER_HZ: f32 = 200.0;

pub struct OnsetTracker {
    band_count: usize,
    prev_bands: Vec<f32>,
    smoothed_flux: f32,
    history: VecDeque<(SampleTime, f32)>,
}

impl OnsetTracker {
    pub fn new(spectrum: &ScaledSpectrum) -> Self {
        let band_count = spectrum.bands_up_to_hz(FLUX_RANGE_UPPER_HZ);
        Self {
            band_count,
            prev_bands: vec![0.0; band_count],
            smoothed_flux: 0.0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Advance one tick and return `true` if an onset is declared
    /// (`smoothed_flux` exceeds its local mean by more than 1.5 standard
    /// deviations).
    pub fn tick(&mut self, spectrum: &ScaledSpectrum, now: SampleTime) -> bool {
        let bands = spectrum.normalized();
        let mut flux = 0.0f32;
        for b in 0..self.band_count {
            let diff = bands[b] - self.prev_bands[b];
            if diff > 0.0 {
                flux += diff;
            }
        }
        self.prev_bands.copy_from_slice(&bands[..self.band_count]);

        self.smoothed_flux = FLUX_SMOOTHING * flux + (1.0 - FLUX_SMOOTHING) * self.smoothed_flux;

        self.history.push_back((now, self.smoothed_flux));
        if self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }

        let (mean, std) = self.local_stats();
        self.smoothed_flux > mean + ONSET_SIGMA_MULT * std
    }

    pub fn smoothed_flux(&self) -> f32 {
        self.smoothed_flux
    }

    pub fn history(&self) -> &VecDeque<(SampleTime, f32)> {
        &self.history
    }

    fn local_stats(&self) -> (f32, f32) {
        let len = self.history.len();
        let n = len.min(LOCAL_STATS_WINDOW);
        if n == 0 {
            return (0.0, 0.0);
        }
        let start = len - n;
        let mut sum = 0.0f32;
        for i in start..len {
            sum += self.history[i].1;
        }
        let mean = sum / n as f32;
        let mut variance = 0.0f32;
        for i in start..len {
            let d = self.history[i].1 - mean;
            variance += d * d;
        }
        (mean, (variance / n as f32).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sound2osc_types::{FRAME_LEN, SAMPLE_RATE_HZ};

    #[test]
    fn silence_never_declares_an_onset() {
        let spectrum = ScaledSpectrum::new(SAMPLE_RATE_HZ, FRAME_LEN);
        let mut tracker = OnsetTracker::new(&spectrum);
        for t in 0..200 {
            assert!(!tracker.tick(&spectrum, t));
        }
    }

    #[test]
    fn history_is_capped_at_capacity() {
        let spectrum = ScaledSpectrum::new(SAMPLE_RATE_HZ, FRAME_LEN);
        let mut tracker = OnsetTracker::new(&spectrum);
        for t in 0..(HISTORY_CAPACITY as u64 + 50) {
            tracker.tick(&spectrum, t);
        }
        assert_eq!(tracker.history().len(), HISTORY_CAPACITY);
        assert_eq!(tracker.history().back().unwrap().0, HISTORY_CAPACITY as u64 + 49);
    }

    #[test]
    fn sudden_energy_jump_declares_onset() {
        let mut spectrum = ScaledSpectrum::new(SAMPLE_RATE_HZ, FRAME_LEN);
        let mut tracker = OnsetTracker::new(&spectrum);
        let quiet = [0.0f32; crate::fft_stage::LINEAR_BIN_COUNT];
        for t in 0..60 {
            spectrum.run(&quiet);
            tracker.tick(&spectrum, t);
        }
        let mut loud = [0.0f32; crate::fft_stage::LINEAR_BIN_COUNT];
        loud[5] = 50.0;
        spectrum.run(&loud);
        assert!(tracker.tick(&spectrum, 60));
    }
}
