pub mod audio_source;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod osc_emitter;

pub use audio_source::{mix_to_mono, AudioSource, AudioSourceSupervisor, NullAudioSource};
pub use config::{EngineConfig, OscProtocol, TransportKind};
pub use diagnostics::{
    DiagnosticCode, DiagnosticEvent, DiagnosticLevel, DiagnosticSink, EngineError,
    LoggingDiagnosticSink,
};
pub use engine::{Engine, TickOutcome, TickScheduler};
pub use osc_emitter::OscEmitter;
