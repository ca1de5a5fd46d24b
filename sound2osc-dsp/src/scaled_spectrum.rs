//! Logarithmic 200-band spectrum with gain, compression, dB conversion, and AGC.

use sound2osc_types::{BAND_BASE_HZ, BAND_COUNT, NYQUIST_HZ};

use crate::fft_stage::LINEAR_BIN_COUNT;

const AGC_DECAY: f32 = 0.9995;
const AGC_FLOOR: f32 = 1e-6;

struct BandEdge {
    lo_bin: f32,
    hi_bin: f32,
    lo_hz: f32,
    center_hz: f32,
}

pub struct ScaledSpectrum {
    edges: Box<[BandEdge; BAND_COUNT]>,
    bands: Box<[f32; BAND_COUNT]>,
    pub gain: f32,
    pub compression: f32,
    pub agc_enabled: bool,
    pub decibel_mode: bool,
    pub agc_envelope: f32,
}

impl ScaledSpectrum {
    pub fn new(sample_rate: f32, fft_len: usize) -> Self {
        let bin_hz = sample_rate / fft_len as f32;
        let r = (NYQUIST_HZ / BAND_BASE_HZ).powf(1.0 / BAND_COUNT as f32);

        let edges: Vec<BandEdge> = (0..BAND_COUNT)
            .map(|b| {
                let lo_hz = BAND_BASE_HZ * r.powi(b as i32);
                let hi_hz = BAND_BASE_HZ * r.powi(b as i32 + 1);
                BandEdge {
                    lo_bin: lo_hz / bin_hz,
                    hi_bin: hi_hz / bin_hz,
                    lo_hz,
                    center_hz: (lo_hz * hi_hz).sqrt(),
                }
            })
            .collect();

        let edges_array: [BandEdge; BAND_COUNT] = edges.try_into().ok().unwrap();
        Self {
            edges: Box::new(edges_array),
            bands: Box::new([0.0; BAND_COUNT]),
            gain: 1.0,
            compression: 1.0,
            agc_enabled: true,
            decibel_mode: false,
            agc_envelope: AGC_FLOOR,
        }
    }

    /// Run the full pipeline — band averaging, gain, compression, dB conversion,
    /// AGC — over a linear magnitude spectrum.
    pub fn run(&mut self, linear: &[f32; LINEAR_BIN_COUNT]) {
        for (i, edge) in self.edges.iter().enumerate() {
            self.bands[i] = band_value(linear, edge.lo_bin, edge.hi_bin) * self.gain;
        }

        for v in self.bands.iter_mut() {
            *v = v.max(0.0).powf(self.compression);
        }

        if self.decibel_mode {
            for v in self.bands.iter_mut() {
                let db = 20.0 * (v.max(AGC_FLOOR)).log10();
                *v = ((db + 60.0) / 60.0).clamp(0.0, 1.0);
            }
        } else {
            for v in self.bands.iter_mut() {
                *v = v.clamp(0.0, 1.0);
            }
        }

        if self.agc_enabled {
            let peak = self.bands.iter().cloned().fold(0.0f32, f32::max);
            self.agc_envelope = peak.max(self.agc_envelope * AGC_DECAY);
            let divisor = self.agc_envelope.max(AGC_FLOOR);
            for v in self.bands.iter_mut() {
                *v = (*v / divisor).clamp(0.0, 1.0);
            }
        }

        debug_assert!(self.bands.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    /// Current band vector.
    pub fn normalized(&self) -> &[f32; BAND_COUNT] {
        &self.bands
    }

    /// Maximum band value whose center frequency falls in
    /// `[center_hz*(1-width), center_hz*(1+width)]`.
    pub fn max_level_in(&self, center_hz: f32, width: f32) -> f32 {
        let lo = center_hz * (1.0 - width);
        let hi = center_hz * (1.0 + width);
        let mut max = 0.0f32;
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.center_hz >= lo && edge.center_hz <= hi {
                max = max.max(self.bands[i]);
            }
        }
        max.clamp(0.0, 1.0)
    }

    /// Number of leading bands whose lower edge sits below `hz` — used by
    /// `OnsetTracker` to restrict spectral flux to the bass-to-low-mid sub-range.
    pub fn bands_up_to_hz(&self, hz: f32) -> usize {
        self.edges.iter().take_while(|e| e.lo_hz < hz).count()
    }
}

/// Average (or interpolate) the linear bins covered by one log band.
fn band_value(linear: &[f32; LINEAR_BIN_COUNT], lo_bin: f32, hi_bin: f32) -> f32 {
    let last = LINEAR_BIN_COUNT - 1;
    if hi_bin - lo_bin < 1.0 {
        let lo_idx = (lo_bin.floor() as usize).min(last);
        let hi_idx = (lo_idx + 1).min(last);
        let frac = (lo_bin - lo_idx as f32).clamp(0.0, 1.0);
        let a = linear[lo_idx];
        let b = linear[hi_idx];
        a + (b - a) * frac
    } else {
        let start = (lo_bin.ceil() as usize).min(last);
        let end = (hi_bin.floor() as usize).min(last);
        if end <= start {
            linear[start]
        } else {
            let sum: f32 = linear[start..=end].iter().sum();
            sum / (end - start + 1) as f32
        }
    }
}
