//! Preset document: the JSON wire form of every user-visible engine setting.
//!
//! Unknown keys at any level are preserved on load and written back unchanged
//! via `#[serde(flatten)]` catch-alls, so a newer preset opened by an older
//! build round-trips without data loss.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trigger::{TriggerDefinition, TriggerId};

/// Current preset format version.
pub const CURRENT_FORMAT_VERSION: i32 = 4;

fn current_format_version() -> i32 {
    CURRENT_FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DspConfig {
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default = "default_compression")]
    pub compression: f32,
    #[serde(default)]
    pub decibel: bool,
    #[serde(default = "default_true")]
    pub agc: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_gain() -> f32 {
    1.0
}

fn default_compression() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            compression: default_compression(),
            decibel: false,
            agc: true,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BpmOscConfig {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmConfig {
    #[serde(default = "default_min_bpm")]
    pub min: f32,
    #[serde(default = "default_max_bpm")]
    pub max: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub osc: BpmOscConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_min_bpm() -> f32 {
    75.0
}

fn default_max_bpm() -> f32 {
    200.0
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            min: default_min_bpm(),
            max: default_max_bpm(),
            mute: false,
            osc: BpmOscConfig::default(),
            extra: Map::new(),
        }
    }
}

/// Root of the preset wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDocument {
    #[serde(rename = "formatVersion", default = "current_format_version")]
    pub format_version: i32,
    #[serde(rename = "lowSoloMode", default)]
    pub low_solo_mode: bool,
    #[serde(default)]
    pub dsp: DspConfig,
    #[serde(default)]
    pub bpm: BpmConfig,
    #[serde(default = "default_triggers")]
    pub triggers: HashMap<TriggerId, TriggerDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_triggers() -> HashMap<TriggerId, TriggerDefinition> {
    TriggerDefinition::defaults()
        .into_iter()
        .map(|def| (def.id, def))
        .collect()
}

impl Default for PresetDocument {
    fn default() -> Self {
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            low_solo_mode: false,
            dsp: DspConfig::default(),
            bpm: BpmConfig::default(),
            triggers: default_triggers(),
            extra: Map::new(),
        }
    }
}

/// Error parsing or applying a preset document.
#[derive(Debug)]
pub enum PresetError {
    Json(serde_json::Error),
    OutOfRange { field: &'static str, value: f32 },
}

impl From<serde_json::Error> for PresetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for PresetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "malformed preset JSON: {}", e),
            Self::OutOfRange { field, value } => {
                write!(f, "preset field '{}' out of range: {}", field, value)
            }
        }
    }
}

impl std::error::Error for PresetError {}

impl PresetDocument {
    pub fn from_json_str(s: &str) -> Result<Self, PresetError> {
        let doc: PresetDocument = serde_json::from_str(s)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, PresetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Range checks on gain, compression, trigger thresholds, and BPM ordering.
    pub fn validate(&self) -> Result<(), PresetError> {
        if !(0.0..=64.0).contains(&self.dsp.gain) {
            return Err(PresetError::OutOfRange {
                field: "dsp.gain",
                value: self.dsp.gain,
            });
        }
        if !(0.5..=2.0).contains(&self.dsp.compression) {
            return Err(PresetError::OutOfRange {
                field: "dsp.compression",
                value: self.dsp.compression,
            });
        }
        if self.bpm.min <= 0.0 || self.bpm.max <= self.bpm.min {
            return Err(PresetError::OutOfRange {
                field: "bpm.min/max",
                value: self.bpm.min,
            });
        }
        for def in self.triggers.values() {
            if !(0.0..=1.0).contains(&def.threshold) {
                return Err(PresetError::OutOfRange {
                    field: "triggers.threshold",
                    value: def.threshold,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_document_round_trips() {
        let doc = PresetDocument::default();
        let json = doc.to_json_string_pretty().unwrap();
        let back = PresetDocument::from_json_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn unknown_keys_are_preserved_round_trip() {
        let mut doc = PresetDocument::default();
        doc.extra.insert("futureTopLevel".into(), Value::from(1));
        let bass = doc.triggers.get_mut(&TriggerId::Bass).unwrap();
        bass.threshold = 0.73;
        bass.extra.insert("future".into(), Value::from(42));

        let json = doc.to_json_string_pretty().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["futureTopLevel"], 1);
        assert_eq!(parsed["triggers"]["bass"]["future"], 42);
        assert_eq!(parsed["triggers"]["bass"]["threshold"], 0.73);

        let back = PresetDocument::from_json_str(&json).unwrap();
        assert_eq!(back.triggers[&TriggerId::Bass].threshold, 0.73);
        assert_eq!(
            back.triggers[&TriggerId::Bass].extra.get("future"),
            Some(&Value::from(42))
        );
    }

    #[test]
    fn rejects_out_of_range_gain() {
        let mut doc = PresetDocument::default();
        doc.dsp.gain = 100.0;
        let json = doc.to_json_string_pretty().unwrap();
        assert!(PresetDocument::from_json_str(&json).is_err());
    }
}
