//! Structured diagnostic events: the engine's only channel for surfacing
//! recoverable failures, since it never performs file or console I/O itself.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    ConfigInvalid,
    AudioUnavailable,
    TransportTransient,
    TransportOverflow,
    TickOverrun,
    ProtocolDecode,
    /// The selected `AudioSource` is running at a rate other than the
    /// assumed 44.1 kHz. The engine proceeds regardless (§6).
    SampleRateMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEvent {
    pub level: DiagnosticLevel,
    pub code: DiagnosticCode,
    pub message: String,
    pub timestamp: sound2osc_types::SampleTime,
}

/// A host-owned sink for diagnostic events. The engine never retains or
/// inspects what the host does with these.
pub trait DiagnosticSink: Send {
    fn emit(&mut self, event: DiagnosticEvent);
}

/// The engine's only `Result`-carried error type (§7): covers the two error
/// kinds whose recovery is a caller-visible failure rather than a pure
/// diagnostic (`from_state` rejecting a bad preset; a decode failure on an
/// inbound packet, surfaced to a caller that wants it as more than a count).
/// Every other §7 kind is transient and reported as a `DiagnosticEvent` only.
#[derive(Debug)]
pub enum EngineError {
    ConfigInvalid(sound2osc_types::PresetError),
    ProtocolDecode,
}

impl From<sound2osc_types::PresetError> for EngineError {
    fn from(e: sound2osc_types::PresetError) -> Self {
        Self::ConfigInvalid(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigInvalid(e) => write!(f, "invalid preset: {}", e),
            Self::ProtocolDecode => write!(f, "malformed OSC packet"),
        }
    }
}

impl std::error::Error for EngineError {}

/// A sink that forwards every event to the `log` crate at a level matching
/// its `DiagnosticLevel`, tagged under the `engine::diagnostics` target.
pub struct LoggingDiagnosticSink;

impl DiagnosticSink for LoggingDiagnosticSink {
    fn emit(&mut self, event: DiagnosticEvent) {
        match event.level {
            DiagnosticLevel::Info => {
                log::info!(target: "engine::diagnostics", "{:?} @ {}: {}", event.code, event.timestamp, event.message)
            }
            DiagnosticLevel::Warn => {
                log::warn!(target: "engine::diagnostics", "{:?} @ {}: {}", event.code, event.timestamp, event.message)
            }
            DiagnosticLevel::Error => {
                log::error!(target: "engine::diagnostics", "{:?} @ {}: {}", event.code, event.timestamp, event.message)
            }
        }
    }
}
