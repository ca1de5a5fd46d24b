use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rosc::{OscMessage, OscPacket};

use sound2osc_engine::diagnostics::LoggingDiagnosticSink;
use sound2osc_engine::{Engine, EngineConfig};
use sound2osc_osc::{OscSender, Transport};
use sound2osc_types::{SAMPLE_RATE_HZ, TriggerId, TriggerState};

struct RecordingTransport {
    messages: Arc<Mutex<Vec<OscMessage>>>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, bytes: &[u8]) -> bool {
        if let Ok((_, packet)) = rosc::decoder::decode_udp(bytes) {
            flatten_into(packet, &self.messages);
        }
        true
    }
}

fn flatten_into(packet: OscPacket, out: &Arc<Mutex<Vec<OscMessage>>>) {
    match packet {
        OscPacket::Message(m) => out.lock().unwrap().push(m),
        OscPacket::Bundle(b) => {
            for element in b.content {
                flatten_into(element, out);
            }
        }
    }
}

fn test_engine() -> (Engine, Arc<Mutex<Vec<OscMessage>>>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let transport = RecordingTransport {
        messages: messages.clone(),
    };
    let sender = OscSender::spawn(Box::new(transport));
    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    let engine = Engine::new(
        EngineConfig::udp(addr),
        sender,
        Box::new(LoggingDiagnosticSink),
    );
    (engine, messages)
}

fn push_tone(engine: &Engine, freq_hz: f32, amplitude: f32, sample_count: usize, phase0: &mut f32) {
    let mut samples = Vec::with_capacity(sample_count);
    let step = 2.0 * std::f32::consts::PI * freq_hz / SAMPLE_RATE_HZ;
    for _ in 0..sample_count {
        samples.push(amplitude * phase0.sin());
        *phase0 += step;
    }
    engine.on_samples(&samples, 1);
}

fn push_silence(engine: &Engine, sample_count: usize) {
    let samples = vec![0.0f32; sample_count];
    engine.on_samples(&samples, 1);
}

/// Deterministic broadband noise (xorshift32) so energy spreads across every
/// band rather than concentrating in one, which is what actually drives the
/// silence detector's global mean down.
fn push_noise(engine: &Engine, sample_count: usize, state: &mut u32) {
    let mut samples = Vec::with_capacity(sample_count);
    for _ in 0..sample_count {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        let unit = (*state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        samples.push(unit * 0.9);
    }
    engine.on_samples(&samples, 1);
}

fn wait_for_drain() {
    std::thread::sleep(std::time::Duration::from_millis(20));
}

/// Scenario A: sustained loud tone at a band-pass detector's own center
/// frequency crosses its threshold and releases when silence follows.
#[test]
fn loud_tone_at_bass_center_triggers_on_then_off_on_silence() {
    let (mut engine, messages) = test_engine();
    engine.start();
    let mut phase = 0.0f32;

    for _ in 0..40u64 {
        push_tone(&engine, 80.0, 0.9, sound2osc_types::FRAME_LEN, &mut phase);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::Bass), Some(TriggerState::Active));

    for _ in 40..80u64 {
        push_silence(&engine, sound2osc_types::FRAME_LEN);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::Bass), Some(TriggerState::Idle));

    wait_for_drain();
    let addrs: Vec<String> = messages.lock().unwrap().iter().map(|m| m.addr.clone()).collect();
    assert!(addrs.iter().any(|a| a.contains("bass") && a.contains("on")));
    assert!(addrs.iter().any(|a| a.contains("bass") && a.contains("off")));
}

/// Scenario B: sustained silence fires the silence detector quickly; sound
/// reappearing releases it.
#[test]
fn silence_detector_fires_and_releases() {
    let (mut engine, _messages) = test_engine();
    engine.start();

    for _ in 0..20u64 {
        push_silence(&engine, sound2osc_types::FRAME_LEN);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::Silence), Some(TriggerState::Active));

    let mut noise_state = 0x9e3779b9u32;
    for _ in 20..60u64 {
        push_noise(&engine, sound2osc_types::FRAME_LEN, &mut noise_state);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::Silence), Some(TriggerState::Idle));
}

/// Scenario D: a preset with an unknown key and a modified threshold applies
/// cleanly and round-trips the unknown key.
#[test]
fn preset_with_unknown_key_applies_and_round_trips() {
    let (mut engine, _messages) = test_engine();
    let mut doc = engine.to_state();
    let bass = doc.triggers.get_mut(&TriggerId::Bass).unwrap();
    bass.threshold = 0.73;
    bass.extra.insert("future".into(), serde_json::Value::from(42));

    let json = doc.to_json_string_pretty().unwrap();
    let reloaded = sound2osc_types::PresetDocument::from_json_str(&json).unwrap();
    engine.from_state(reloaded).unwrap();

    let restored = engine.to_state();
    assert_eq!(restored.triggers[&TriggerId::Bass].threshold, 0.73);
    assert_eq!(
        restored.triggers[&TriggerId::Bass].extra.get("future"),
        Some(&serde_json::Value::from(42))
    );
}

/// Scenario F: enabling low-solo releases high-frequency band-pass detectors
/// while leaving bass untouched.
#[test]
fn low_solo_mode_releases_high_band_detectors_only() {
    let (mut engine, _messages) = test_engine();
    engine.start();
    let mut phase = 0.0f32;

    for _ in 0..40u64 {
        push_tone(&engine, 8_000.0, 0.9, sound2osc_types::FRAME_LEN, &mut phase);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::High), Some(TriggerState::Active));

    engine.set_low_solo_mode(true);
    for _ in 40..80u64 {
        push_tone(&engine, 8_000.0, 0.9, sound2osc_types::FRAME_LEN, &mut phase);
        engine.tick();
    }
    assert_eq!(engine.trigger_state(TriggerId::High), Some(TriggerState::Idle));
    assert_eq!(engine.trigger_state(TriggerId::Bass), Some(TriggerState::Idle));
}
