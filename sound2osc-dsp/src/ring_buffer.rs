//! Lock-free single-producer/single-consumer ring buffer.
//!
//! The audio-context producer calls `push`; the processing-context consumer calls
//! `snapshot_last`. Both are wait-free: storage is a fixed-size array of atomics
//! allocated once at construction, so there is zero heap activity on the hot path.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use sound2osc_types::FRAME_LEN;

/// Ring capacity: 4 × frame length.
pub const CAPACITY: usize = FRAME_LEN * 4;

pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    /// Total number of samples ever pushed. Monotonic; never wraps within a
    /// realistic runtime.
    cursor: AtomicU64,
}

impl RingBuffer {
    pub fn new() -> Self {
        let slots = (0..CAPACITY)
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            cursor: AtomicU64::new(0),
        }
    }

    /// Append samples from the audio producer. Never blocks, never allocates. On
    /// overrun (more than `CAPACITY` samples pushed since the last read) the oldest
    /// samples are silently discarded — the producer is canonical.
    pub fn push(&self, samples: &[f32]) {
        for &sample in samples {
            let cur = self.cursor.load(Ordering::Relaxed);
            let idx = (cur % CAPACITY as u64) as usize;
            self.slots[idx].store(sample.to_bits(), Ordering::Relaxed);
            self.cursor.store(cur + 1, Ordering::Release);
        }
    }

    /// Total samples pushed so far.
    pub fn total_pushed(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Copy the `out.len()` most recent samples into `out`. If fewer samples have
    /// ever been pushed, the prefix is zero-filled. Always returns the freshest
    /// window even if more samples arrived since the previous call — a sliding
    /// window, not a queue.
    pub fn snapshot_last(&self, out: &mut [f32]) {
        let n = out.len();
        let cur = self.cursor.load(Ordering::Acquire);
        let available = cur.min(n as u64) as usize;
        let zero_prefix = n - available;
        let start = cur - available as u64;

        out[..zero_prefix].fill(0.0);
        for i in 0..available {
            let sample_index = start + i as u64;
            let idx = (sample_index % CAPACITY as u64) as usize;
            out[zero_prefix + i] = f32::from_bits(self.slots[idx].load(Ordering::Relaxed));
        }
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
