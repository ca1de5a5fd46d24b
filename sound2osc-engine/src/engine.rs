//! The orchestrator: owns every processing-context component and drives the
//! two-task tick (SpectrumTick then BeatTick) that the rest of the crate
//! family feeds into.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rosc::OscMessage;

use sound2osc_dsp::{
    FftStage, OnsetTracker, RingBuffer, ScaledSpectrum, TempoEstimator, TickSummary,
    TickTelemetry, TriggerDetector, TriggerEvent, TriggerFilter,
};
use sound2osc_osc::{message_from_template, InboundControl, OscReceiver, OscSender, TemplateArg};
use sound2osc_types::{
    BpmConfig, BpmOscConfig, DspConfig, PresetDocument, SampleTime, TriggerDefinition, TriggerId,
    SAMPLE_RATE_HZ,
};

use crate::audio_source::mix_to_mono;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticLevel, DiagnosticSink, EngineError};
use crate::osc_emitter::OscEmitter;

const BPM_ADDRESS: &str = "/sound2osc/out/bpm";
const BEAT_ADDRESS: &str = "/sound2osc/out/beat";
const BPM_CHANGE_THRESHOLD: f32 = 0.5;

/// Pairs a trigger's fixed configuration with the detector/filter pair that
/// evaluate it, preserving the fixed emission order (bass, lo-mid, hi-mid,
/// high, envelope, silence).
struct TriggerSlot {
    id: TriggerId,
    def: TriggerDefinition,
    detector: TriggerDetector,
    filter: TriggerFilter,
}

pub struct Engine {
    config: EngineConfig,
    ring: RingBuffer,
    fft_stage: FftStage,
    spectrum: ScaledSpectrum,
    low_solo_mode: bool,
    slots: Vec<TriggerSlot>,
    onset_tracker: OnsetTracker,
    tempo: TempoEstimator,
    bpm_min: f32,
    bpm_max: f32,
    bpm_mute: bool,
    bpm_osc: BpmOscConfig,
    last_emitted_bpm: Option<f32>,
    emitter: OscEmitter,
    inbound: Option<OscReceiver>,
    last_decode_error_count: usize,
    telemetry: TickTelemetry,
    diagnostics: Box<dyn DiagnosticSink>,
    running: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        sender: OscSender,
        diagnostics: Box<dyn DiagnosticSink>,
    ) -> Self {
        let spectrum = ScaledSpectrum::new(config.sample_rate, sound2osc_types::FRAME_LEN);
        let onset_tracker = OnsetTracker::new(&spectrum);
        let bpm = BpmConfig::default();
        let tempo = TempoEstimator::new(bpm.min, bpm.max, config.sample_rate);

        let slots = TriggerDefinition::defaults()
            .into_iter()
            .map(|def| TriggerSlot {
                id: def.id,
                detector: TriggerDetector::new(def.kind),
                filter: TriggerFilter::new(),
                def,
            })
            .collect();

        let osc_1_1 = config.is_osc_1_1();

        Self {
            config,
            ring: RingBuffer::new(),
            fft_stage: FftStage::new(),
            spectrum,
            low_solo_mode: false,
            slots,
            onset_tracker,
            tempo,
            bpm_min: bpm.min,
            bpm_max: bpm.max,
            bpm_mute: bpm.mute,
            bpm_osc: bpm.osc,
            last_emitted_bpm: None,
            emitter: OscEmitter::new(sender, osc_1_1),
            inbound: None,
            last_decode_error_count: 0,
            telemetry: TickTelemetry::new(((1.0 / sound2osc_types::TICK_HZ) * 1_000_000.0) as u32),
            diagnostics,
            running: false,
        }
    }

    /// Bind the inbound control listener (§6 "OSC incoming"). Optional: an
    /// engine with no listener simply never receives `InboundControl`.
    /// `bind_addr` is typically `"0.0.0.0:<port>"`.
    pub fn listen_for_control(&mut self, bind_addr: &str) -> std::io::Result<std::net::SocketAddr> {
        let receiver = OscReceiver::bind(bind_addr)?;
        let local_addr = receiver.local_addr();
        self.inbound = Some(receiver);
        Ok(local_addr)
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Idempotent; in-flight OSC is drained by the sender thread's own
    /// shutdown, not by this call.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Audio-context entry point. Must not allocate beyond the mixdown buffer
    /// for multi-channel input, must not lock, log, or block.
    pub fn on_samples(&self, interleaved: &[f32], channel_count: usize) {
        if channel_count <= 1 {
            self.ring.push(interleaved);
        } else {
            let mono = mix_to_mono(interleaved, channel_count);
            self.ring.push(&mono);
        }
    }

    /// Run one full tick (SpectrumTick then BeatTick) and flush pending OSC.
    ///
    /// `now` is the ring buffer's own sample cursor (`RingBuffer::total_pushed`),
    /// not a caller-supplied counter: every timer this tick drives — on/off/max-hold
    /// delays, IOI windowing, BPM staleness — is measured in samples, so the clock
    /// they advance against must be the same one the audio producer actually fed.
    pub fn tick(&mut self) {
        let start = Instant::now();
        let now = self.ring.total_pushed();

        self.drain_inbound_control(now);

        self.spectrum_tick(now);
        self.beat_tick(now);

        if !self.emitter.flush() {
            self.diagnostics.emit(DiagnosticEvent {
                level: DiagnosticLevel::Warn,
                code: DiagnosticCode::TransportOverflow,
                message: "OSC send queue full; packet dropped".into(),
                timestamp: now,
            });
        }

        let elapsed_us = start.elapsed().as_micros().min(u32::MAX as u128) as u32;
        self.telemetry.record(elapsed_us);
    }

    pub fn telemetry_summary(&self) -> TickSummary {
        self.telemetry.take_summary()
    }

    pub fn report_overrun(&mut self) {
        self.diagnostics.emit(DiagnosticEvent {
            level: DiagnosticLevel::Warn,
            code: DiagnosticCode::TickOverrun,
            message: "tick missed its deadline and was skipped".into(),
            timestamp: self.ring.total_pushed(),
        });
    }

    fn spectrum_tick(&mut self, now: SampleTime) {
        self.fft_stage.run(&self.ring);
        self.spectrum.run(self.fft_stage.linear_spectrum());

        for slot in self.slots.iter_mut() {
            let level = slot.detector.level(&self.spectrum, self.low_solo_mode);
            let mut events = Vec::new();
            slot.filter.tick(&slot.def, level, now, self.config.sample_rate, &mut events);
            if slot.def.mute {
                continue;
            }
            for event in events {
                if let Some(message) = Self::event_to_message(&slot.def, event) {
                    self.emitter.push(message);
                }
            }
        }
    }

    fn event_to_message(def: &TriggerDefinition, event: TriggerEvent) -> Option<OscMessage> {
        match event {
            TriggerEvent::On => def
                .osc
                .on_msg
                .as_ref()
                .map(|t| message_from_template(t, TemplateArg::Int(1))),
            TriggerEvent::Off => def
                .osc
                .off_msg
                .as_ref()
                .map(|t| message_from_template(t, TemplateArg::Int(0))),
            TriggerEvent::Level(value) => def
                .osc
                .level_msg
                .as_ref()
                .map(|t| message_from_template(t, TemplateArg::Float(value))),
        }
    }

    fn beat_tick(&mut self, now: SampleTime) {
        let onset = self.onset_tracker.tick(&self.spectrum, now);
        if onset {
            self.tempo.on_onset(now);
        } else {
            self.tempo.refresh(now);
        }

        let estimate = self.tempo.estimate();

        if !self.bpm_mute {
            if let Some(bpm) = estimate.bpm {
                let changed = self
                    .last_emitted_bpm
                    .map_or(true, |prev| (bpm - prev).abs() > BPM_CHANGE_THRESHOLD);
                if changed && !estimate.stale {
                    self.emit_bpm(bpm);
                    self.last_emitted_bpm = Some(bpm);
                }
            }

            if onset && !estimate.stale {
                self.emitter.push(OscMessage {
                    addr: BEAT_ADDRESS.into(),
                    args: vec![],
                });
            }
        }
    }

    fn emit_bpm(&mut self, bpm: f32) {
        self.emitter.push(OscMessage {
            addr: BPM_ADDRESS.into(),
            args: vec![rosc::OscType::Float(bpm)],
        });
        for addr in &self.bpm_osc.commands {
            self.emitter.push(OscMessage {
                addr: addr.clone(),
                args: vec![rosc::OscType::Float(bpm)],
            });
        }
    }

    pub fn set_low_solo_mode(&mut self, enabled: bool) {
        self.low_solo_mode = enabled;
    }

    pub fn trigger_state(&self, id: TriggerId) -> Option<sound2osc_types::TriggerState> {
        self.slots.iter().find(|s| s.id == id).map(|s| s.filter.state())
    }

    pub fn beat_estimate(&self) -> sound2osc_types::BeatEstimate {
        self.tempo.estimate()
    }

    /// Apply an inbound runtime-control message as a single atomic mutation.
    /// Unknown/unsupported addresses were already filtered by the router;
    /// this only interprets the closed set of `InboundControl` variants.
    /// Timestamped against the ring buffer's sample cursor, same as `tick`.
    pub fn apply_control(&mut self, control: InboundControl) {
        let now = self.ring.total_pushed();
        match control {
            InboundControl::SetTriggerThreshold { id, threshold } => {
                if let Some(slot) = self.slots.iter_mut().find(|s| s.id == id) {
                    slot.def.threshold = threshold.clamp(0.0, 1.0);
                }
            }
            InboundControl::LoadPreset { json } => match PresetDocument::from_json_str(&json) {
                // `from_state` already reports a validation failure; a parse
                // failure never reaches it, so it is reported here instead.
                Ok(doc) => {
                    let _ = self.from_state(doc);
                }
                Err(e) => self.diagnostics.emit(DiagnosticEvent {
                    level: DiagnosticLevel::Warn,
                    code: DiagnosticCode::ConfigInvalid,
                    message: format!("rejected preset load: {}", e),
                    timestamp: now,
                }),
            },
            InboundControl::SetBpmMute(muted) => self.bpm_mute = muted,
            InboundControl::BpmTap => self.tap_now(),
        }
    }

    pub fn tap_now(&mut self) {
        self.tempo.tap(self.ring.total_pushed());
    }

    /// Decode a raw inbound OSC packet and apply every control message found
    /// inside it (a bundle may carry several). For hosts that run their own
    /// socket rather than `listen_for_control`'s background thread. Returns
    /// `EngineError::ProtocolDecode` without touching any state if `bytes`
    /// isn't valid OSC; the caller decides whether that is worth a
    /// diagnostic.
    pub fn apply_inbound_bytes(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let (_, packet) =
            rosc::decoder::decode_udp(bytes).map_err(|_| EngineError::ProtocolDecode)?;
        for control in sound2osc_osc::route_packet(&packet) {
            self.apply_control(control);
        }
        Ok(())
    }

    /// Drain whatever `InboundControl` values arrived on the control
    /// listener since the last tick and apply each in order. A no-op if no
    /// listener was ever attached via `listen_for_control`.
    fn drain_inbound_control(&mut self, now: SampleTime) {
        let Some(receiver) = self.inbound.as_ref() else {
            return;
        };
        let controls = receiver.drain();
        let decode_errors = receiver.decode_error_count();
        let new_errors = decode_errors.saturating_sub(self.last_decode_error_count);
        self.last_decode_error_count = decode_errors;

        for control in controls {
            self.apply_control(control);
        }

        for _ in 0..new_errors {
            self.diagnostics.emit(DiagnosticEvent {
                level: DiagnosticLevel::Warn,
                code: DiagnosticCode::ProtocolDecode,
                message: "dropped a malformed inbound OSC packet".into(),
                timestamp: now,
            });
        }
    }

    /// Snapshot every mutable configuration field as a `PresetDocument`.
    pub fn to_state(&self) -> PresetDocument {
        let triggers: HashMap<TriggerId, TriggerDefinition> = self
            .slots
            .iter()
            .map(|s| (s.id, s.def.clone()))
            .collect();

        PresetDocument {
            format_version: sound2osc_types::preset::CURRENT_FORMAT_VERSION,
            low_solo_mode: self.low_solo_mode,
            dsp: DspConfig {
                gain: self.spectrum.gain,
                compression: self.spectrum.compression,
                decibel: self.spectrum.decibel_mode,
                agc: self.spectrum.agc_enabled,
                extra: Default::default(),
            },
            bpm: BpmConfig {
                min: self.bpm_min,
                max: self.bpm_max,
                mute: self.bpm_mute,
                osc: self.bpm_osc.clone(),
                extra: Default::default(),
            },
            triggers,
            extra: Default::default(),
        }
    }

    /// Apply a preset document atomically. Must only be called between ticks;
    /// rejects (and reports) an invalid document without touching state,
    /// per §7 "`from_state` returns failure".
    pub fn from_state(&mut self, doc: PresetDocument) -> Result<(), EngineError> {
        if let Err(e) = doc.validate() {
            self.diagnostics.emit(DiagnosticEvent {
                level: DiagnosticLevel::Warn,
                code: DiagnosticCode::ConfigInvalid,
                message: format!("preset rejected: {}", e),
                timestamp: 0,
            });
            return Err(EngineError::from(e));
        }

        self.low_solo_mode = doc.low_solo_mode;
        self.spectrum.gain = doc.dsp.gain;
        self.spectrum.compression = doc.dsp.compression;
        self.spectrum.decibel_mode = doc.dsp.decibel;
        self.spectrum.agc_enabled = doc.dsp.agc;
        self.bpm_mute = doc.bpm.mute;
        self.bpm_osc = doc.bpm.osc;

        if doc.bpm.min != self.bpm_min || doc.bpm.max != self.bpm_max {
            self.bpm_min = doc.bpm.min;
            self.bpm_max = doc.bpm.max;
            self.tempo = TempoEstimator::new(self.bpm_min, self.bpm_max, self.config.sample_rate);
        }

        for slot in self.slots.iter_mut() {
            if let Some(def) = doc.triggers.get(&slot.id) {
                slot.def = def.clone();
                slot.detector = TriggerDetector::new(slot.def.kind);
            }
        }
        Ok(())
    }
}

/// Deterministic scheduler for a fixed-rate tick: decides whether a poll
/// arrives early, on time, or so late the overdue tick must be skipped
/// rather than backlogged.
pub struct TickScheduler {
    period: Duration,
    next_due: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NotDue,
    Run,
    Overrun,
}

impl TickScheduler {
    pub fn new(rate_hz: f32) -> Self {
        let period = Duration::from_secs_f32(1.0 / rate_hz);
        Self {
            period,
            next_due: Instant::now() + period,
        }
    }

    pub fn poll(&mut self, now: Instant) -> TickOutcome {
        if now < self.next_due {
            return TickOutcome::NotDue;
        }
        let late_by = now.duration_since(self.next_due);
        let overrun = late_by > self.period;
        self.next_due += self.period;
        while self.next_due <= now {
            self.next_due += self.period;
        }
        if overrun {
            TickOutcome::Overrun
        } else {
            TickOutcome::Run
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(SAMPLE_RATE_HZ / sound2osc_types::FRAME_LEN as f32)
    }
}


#[cfg(test)]
mod scheduler_tests {
    use super::*;

    #[test]
    fn not_due_before_the_first_period_elapses() {
        let mut sched = TickScheduler::new(44.0);
        assert_eq!(sched.poll(Instant::now()), TickOutcome::NotDue);
    }

    #[test]
    fn runs_once_the_period_elapses() {
        let mut sched = TickScheduler::new(44.0);
        let period = Duration::from_secs_f32(1.0 / 44.0);
        assert_eq!(sched.poll(Instant::now() + period), TickOutcome::Run);
    }

    #[test]
    fn a_poll_more_than_one_period_late_is_an_overrun_and_never_backlogs() {
        let mut sched = TickScheduler::new(44.0);
        let period = Duration::from_secs_f32(1.0 / 44.0);
        let late = Instant::now() + period * 3;
        assert_eq!(sched.poll(late), TickOutcome::Overrun);

        // The missed ticks are skipped, not queued: the very next on-time
        // poll is simply NotDue rather than immediately firing again.
        assert_eq!(sched.poll(late), TickOutcome::NotDue);
    }
}
