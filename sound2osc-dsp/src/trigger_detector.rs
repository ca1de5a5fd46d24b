//! Band-energy level computation for the three trigger variants.

use sound2osc_types::{TriggerKind, BAND_COUNT};

use crate::scaled_spectrum::ScaledSpectrum;

pub struct TriggerDetector {
    pub kind: TriggerKind,
}

impl TriggerDetector {
    pub fn new(kind: TriggerKind) -> Self {
        Self { kind }
    }

    /// Current level in `[0, 1]` for this detector's variant.
    pub fn level(&self, spectrum: &ScaledSpectrum, low_solo: bool) -> f32 {
        match self.kind {
            TriggerKind::BandPass { center_hz, width } => {
                if low_solo && self.kind.is_high_band_pass() {
                    0.0
                } else {
                    spectrum.max_level_in(center_hz, width)
                }
            }
            TriggerKind::Envelope => envelope_level(spectrum),
            TriggerKind::Silence => 1.0 - mean_all(spectrum),
        }
    }
}

/// Linearly weighted mean across the whole band grid (20 Hz .. Nyquist), low bands
/// dominating.
fn envelope_level(spectrum: &ScaledSpectrum) -> f32 {
    let bands = spectrum.normalized();
    let mut weighted_sum = 0.0f32;
    let mut weight_total = 0.0f32;
    for (b, &level) in bands.iter().enumerate() {
        let weight = (BAND_COUNT - b) as f32;
        weighted_sum += level * weight;
        weight_total += weight;
    }
    weighted_sum / weight_total
}

fn mean_all(spectrum: &ScaledSpectrum) -> f32 {
    let bands = spectrum.normalized();
    bands.iter().sum::<f32>() / BAND_COUNT as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use sound2osc_types::{FRAME_LEN, SAMPLE_RATE_HZ};

    #[test]
    fn low_solo_releases_high_band_pass_only() {
        let spectrum = ScaledSpectrum::new(SAMPLE_RATE_HZ, FRAME_LEN);
        let high = TriggerDetector::new(TriggerKind::BandPass {
            center_hz: 5_000.0,
            width: 0.2,
        });
        let bass = TriggerDetector::new(TriggerKind::BandPass {
            center_hz: 80.0,
            width: 0.2,
        });
        assert_eq!(high.level(&spectrum, true), 0.0);
        // bass is unaffected by low-solo, though the spectrum itself is empty here.
        assert_eq!(bass.level(&spectrum, true), spectrum.max_level_in(80.0, 0.2));
    }

    #[test]
    fn silence_is_one_when_spectrum_empty() {
        let spectrum = ScaledSpectrum::new(SAMPLE_RATE_HZ, FRAME_LEN);
        let detector = TriggerDetector::new(TriggerKind::Silence);
        assert!((detector.level(&spectrum, false) - 1.0).abs() < 1e-6);
    }
}
