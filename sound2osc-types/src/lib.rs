pub mod beat;
pub mod preset;
pub mod trigger;

pub use beat::BeatEstimate;
pub use preset::{BpmConfig, BpmOscConfig, DspConfig, PresetDocument, PresetError};
pub use trigger::{
    OscBinding, OscTemplate, TriggerDefinition, TriggerId, TriggerKind, TriggerRuntime,
    TriggerState,
};

/// Monotonic sample-index timestamp. Never wraps within realistic runtimes.
pub type SampleTime = u64;

/// Audio processing rate assumed throughout the engine.
pub const SAMPLE_RATE_HZ: f32 = 44_100.0;

/// FFT frame size in samples (N).
pub const FRAME_LEN: usize = 4096;

/// Number of logarithmic bands in a `Spectrum`.
pub const BAND_COUNT: usize = 200;

/// Lower edge of the band grid.
pub const BAND_BASE_HZ: f32 = 20.0;

/// Nyquist frequency for the assumed sample rate.
pub const NYQUIST_HZ: f32 = SAMPLE_RATE_HZ / 2.0;

/// Nominal tick rate of both SpectrumTick and BeatTick.
pub const TICK_HZ: f32 = 44.0;
