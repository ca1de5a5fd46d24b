//! Windowed real FFT of a fixed N-sample frame.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use sound2osc_types::FRAME_LEN;

use crate::ring_buffer::RingBuffer;

/// Linear magnitude spectrum length (N/2).
pub const LINEAR_BIN_COUNT: usize = FRAME_LEN / 2;

pub struct FftStage {
    fft: Arc<dyn Fft<f32>>,
    window: Box<[f32; FRAME_LEN]>,
    frame: Box<[f32; FRAME_LEN]>,
    scratch_complex: Box<[Complex32; FRAME_LEN]>,
    scratch_fft: Box<[Complex32]>,
    linear_spectrum: Box<[f32; LINEAR_BIN_COUNT]>,
}

impl FftStage {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FRAME_LEN);
        let scratch_len = fft.get_inplace_scratch_len();

        let mut window = [0.0f32; FRAME_LEN];
        for (i, w) in window.iter_mut().enumerate() {
            // Hann window: 0.5 * (1 - cos(2*pi*i/(N-1)))
            *w = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (FRAME_LEN - 1) as f32).cos());
        }

        Self {
            fft,
            window: Box::new(window),
            frame: Box::new([0.0; FRAME_LEN]),
            scratch_complex: Box::new([Complex32::new(0.0, 0.0); FRAME_LEN]),
            scratch_fft: vec![Complex32::new(0.0, 0.0); scratch_len].into_boxed_slice(),
            linear_spectrum: Box::new([0.0; LINEAR_BIN_COUNT]),
        }
    }

    /// Snapshot the latest frame, window it, transform it, and store the linear
    /// magnitude spectrum. Infallible; never allocates.
    pub fn run(&mut self, ring: &RingBuffer) {
        ring.snapshot_last(self.frame.as_mut_slice());

        for i in 0..FRAME_LEN {
            self.scratch_complex[i] = Complex32::new(self.frame[i] * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(self.scratch_complex.as_mut_slice(), &mut self.scratch_fft);

        for bin in 0..LINEAR_BIN_COUNT {
            self.linear_spectrum[bin] = self.scratch_complex[bin].norm();
        }
    }

    /// Borrow the linear magnitude spectrum produced by the last `run()`.
    pub fn linear_spectrum(&self) -> &[f32; LINEAR_BIN_COUNT] {
        &self.linear_spectrum
    }
}

impl Default for FftStage {
    fn default() -> Self {
        Self::new()
    }
}
