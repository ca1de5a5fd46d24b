//! Trigger definitions and runtime state shared between the detector, the filter
//! state machine, and preset (de)serialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of one of the six fixed trigger detectors. A closed set rather than
/// an open `Name` string so preset round-trips and OSC address binding can be
/// matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerId {
    Bass,
    LoMid,
    HiMid,
    High,
    Envelope,
    Silence,
}

impl TriggerId {
    pub const ALL: [TriggerId; 6] = [
        TriggerId::Bass,
        TriggerId::LoMid,
        TriggerId::HiMid,
        TriggerId::High,
        TriggerId::Envelope,
        TriggerId::Silence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerId::Bass => "bass",
            TriggerId::LoMid => "loMid",
            TriggerId::HiMid => "hiMid",
            TriggerId::High => "high",
            TriggerId::Envelope => "envelope",
            TriggerId::Silence => "silence",
        }
    }
}

/// Level-computation variant for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriggerKind {
    BandPass { center_hz: f32, width: f32 },
    Envelope,
    Silence,
}

impl TriggerKind {
    /// True if this detector is subject to the global low-solo release rule
    /// (band-pass detectors whose center sits above ~1 kHz).
    pub fn is_high_band_pass(&self) -> bool {
        matches!(self, TriggerKind::BandPass { center_hz, .. } if *center_hz >= 1_000.0)
    }
}

/// A single OSC address + value-format descriptor. `$v` is replaced at emission
/// time by the runtime-computed argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscTemplate {
    pub address: String,
}

impl OscTemplate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// OSC wiring for a single trigger: on/off/level message templates plus the
/// level-message value range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscBinding {
    #[serde(default)]
    pub on_msg: Option<OscTemplate>,
    #[serde(default)]
    pub off_msg: Option<OscTemplate>,
    #[serde(default)]
    pub level_msg: Option<OscTemplate>,
    #[serde(default)]
    pub level_min: f32,
    #[serde(default = "default_level_max")]
    pub level_max: f32,
    #[serde(default)]
    pub label: String,
}

fn default_level_max() -> f32 {
    1.0
}

impl Default for OscBinding {
    fn default() -> Self {
        Self {
            on_msg: None,
            off_msg: None,
            level_msg: None,
            level_min: 0.0,
            level_max: 1.0,
            label: String::new(),
        }
    }
}

/// Full configuration of one trigger detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub id: TriggerId,
    #[serde(flatten)]
    pub kind: TriggerKind,
    #[serde(default)]
    pub threshold: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub on_delay_s: f32,
    #[serde(default)]
    pub off_delay_s: f32,
    #[serde(default)]
    pub max_hold_s: f32,
    #[serde(default)]
    pub osc: OscBinding,
    /// Unknown fields preserved verbatim across a load/save cycle.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriggerDefinition {
    /// Built-in default layout for the four band-pass bands plus envelope/silence,
    /// with center frequencies spread across the audible spectrum. Each trigger's
    /// `OscBinding` is pre-wired to `/sound2osc/out/trigger/<name>/{on,off,level}`
    /// so a freshly constructed engine emits OSC out of the box; a host is free to
    /// rebind these addresses via a preset.
    pub fn defaults() -> [TriggerDefinition; 6] {
        [
            TriggerDefinition {
                id: TriggerId::Bass,
                kind: TriggerKind::BandPass {
                    center_hz: 80.0,
                    width: 0.2,
                },
                threshold: 0.3,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.1,
                max_hold_s: 0.0,
                osc: default_osc_binding("bass"),
                extra: Map::new(),
            },
            TriggerDefinition {
                id: TriggerId::LoMid,
                kind: TriggerKind::BandPass {
                    center_hz: 400.0,
                    width: 0.25,
                },
                threshold: 0.3,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.1,
                max_hold_s: 0.0,
                osc: default_osc_binding("loMid"),
                extra: Map::new(),
            },
            TriggerDefinition {
                id: TriggerId::HiMid,
                kind: TriggerKind::BandPass {
                    center_hz: 2_000.0,
                    width: 0.25,
                },
                threshold: 0.3,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.1,
                max_hold_s: 0.0,
                osc: default_osc_binding("hiMid"),
                extra: Map::new(),
            },
            TriggerDefinition {
                id: TriggerId::High,
                kind: TriggerKind::BandPass {
                    center_hz: 8_000.0,
                    width: 0.3,
                },
                threshold: 0.3,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.1,
                max_hold_s: 0.0,
                osc: default_osc_binding("high"),
                extra: Map::new(),
            },
            TriggerDefinition {
                id: TriggerId::Envelope,
                kind: TriggerKind::Envelope,
                threshold: 0.2,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.1,
                max_hold_s: 0.0,
                osc: default_osc_binding("envelope"),
                extra: Map::new(),
            },
            TriggerDefinition {
                id: TriggerId::Silence,
                kind: TriggerKind::Silence,
                threshold: 0.2,
                mute: false,
                on_delay_s: 0.0,
                off_delay_s: 0.0,
                max_hold_s: 0.0,
                osc: default_osc_binding("silence"),
                extra: Map::new(),
            },
        ]
    }
}

/// `on`/`off`/`level` templates addressed under `/sound2osc/out/trigger/<name>/…`,
/// the OSC binding a freshly constructed trigger carries until a preset rebinds it.
fn default_osc_binding(name: &str) -> OscBinding {
    OscBinding {
        on_msg: Some(OscTemplate::new(format!("/sound2osc/out/trigger/{}/on", name))),
        off_msg: Some(OscTemplate::new(format!("/sound2osc/out/trigger/{}/off", name))),
        level_msg: Some(OscTemplate::new(format!("/sound2osc/out/trigger/{}/level", name))),
        level_min: 0.0,
        level_max: 1.0,
        label: name.into(),
    }
}

/// `TriggerFilter` state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    Idle,
    OnPending,
    Active,
    OffPending,
}

/// Runtime state of a `TriggerFilter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerRuntime {
    pub state: TriggerState,
    pub state_entered_at: crate::SampleTime,
    pub last_level: f32,
}

impl Default for TriggerRuntime {
    fn default() -> Self {
        Self {
            state: TriggerState::Idle,
            state_entered_at: 0,
            last_level: 0.0,
        }
    }
}
