//! The externally-supplied capture backend. Device enumeration and platform
//! capture are out of scope here; this trait is the seam the engine drives.

use std::time::{Duration, Instant};

use sound2osc_types::{SampleTime, SAMPLE_RATE_HZ};

use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticLevel, DiagnosticSink};

pub trait AudioSource: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn list_devices(&self) -> Vec<String>;
    fn select(&mut self, name: &str) -> bool;
    fn active_name(&self) -> Option<String>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    /// Declared sample rate of the active device, in Hz. Checked against the
    /// 44.1 kHz assumption at selection time (§6).
    fn sample_rate_hz(&self) -> u32;
}

/// Mix interleaved multi-channel samples down to mono by averaging channels.
pub fn mix_to_mono(interleaved: &[f32], channel_count: usize) -> Vec<f32> {
    if channel_count <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channel_count)
        .map(|frame| frame.iter().sum::<f32>() / channel_count as f32)
        .collect()
}

/// An `AudioSource` with no real backend: `select` always fails, so the
/// engine falls back to a zero-valued ring buffer and retries on schedule.
pub struct NullAudioSource {
    volume: f32,
}

impl Default for NullAudioSource {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}

impl AudioSource for NullAudioSource {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn list_devices(&self) -> Vec<String> {
        Vec::new()
    }
    fn select(&mut self, _name: &str) -> bool {
        false
    }
    fn active_name(&self) -> Option<String> {
        None
    }
    fn volume(&self) -> f32 {
        self.volume
    }
    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
    fn sample_rate_hz(&self) -> u32 {
        SAMPLE_RATE_HZ as u32
    }
}

/// Minimum interval between re-attempts to select a device after
/// `AudioUnavailable` (§7).
const SELECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Wraps a caller-supplied `AudioSource`, retrying device selection on a
/// fixed schedule and surfacing `AudioUnavailable`/`SampleRateMismatch`
/// diagnostics instead of failing. Lives outside `Engine` itself — the
/// engine only ever sees a `RingBuffer` fed by samples, never the source.
pub struct AudioSourceSupervisor<S: AudioSource> {
    source: S,
    device_name: String,
    selected: bool,
    last_attempt: Option<Instant>,
    rate_checked: bool,
}

impl<S: AudioSource> AudioSourceSupervisor<S> {
    pub fn new(source: S, device_name: impl Into<String>) -> Self {
        Self {
            source,
            device_name: device_name.into(),
            selected: false,
            last_attempt: None,
            rate_checked: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Attempt (or retry) device selection. Call once per tick; retries are
    /// throttled to `SELECT_RETRY_INTERVAL` so a missing device doesn't burn
    /// CPU in the processing context.
    pub fn poll(&mut self, now: Instant, sample_time: SampleTime, diagnostics: &mut dyn DiagnosticSink) {
        if self.selected {
            return;
        }
        let due = self
            .last_attempt
            .map_or(true, |t| now.duration_since(t) >= SELECT_RETRY_INTERVAL);
        if !due {
            return;
        }
        self.last_attempt = Some(now);

        if self.source.select(&self.device_name) {
            self.selected = true;
            self.source.start();
            self.check_sample_rate(sample_time, diagnostics);
        } else {
            diagnostics.emit(DiagnosticEvent {
                level: DiagnosticLevel::Warn,
                code: DiagnosticCode::AudioUnavailable,
                message: format!("audio source '{}' not selectable", self.device_name),
                timestamp: sample_time,
            });
        }
    }

    fn check_sample_rate(&mut self, sample_time: SampleTime, diagnostics: &mut dyn DiagnosticSink) {
        if self.rate_checked {
            return;
        }
        self.rate_checked = true;
        let observed = self.source.sample_rate_hz();
        if observed != SAMPLE_RATE_HZ as u32 {
            diagnostics.emit(DiagnosticEvent {
                level: DiagnosticLevel::Warn,
                code: DiagnosticCode::SampleRateMismatch,
                message: format!(
                    "audio source '{}' reports {} Hz; engine assumes {} Hz",
                    self.device_name, observed, SAMPLE_RATE_HZ as u32
                ),
                timestamp: sample_time,
            });
        }
    }
}
