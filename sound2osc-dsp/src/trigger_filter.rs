//! On-delay / off-delay / max-hold timing state machine.
//!
//! Timers are sample-time counters advanced inside each tick rather than
//! real-time one-shot timers — deterministic under a slow tick and easy to
//! test offline.

use sound2osc_types::{SampleTime, TriggerDefinition, TriggerRuntime, TriggerState};

/// Level messages are rate-limited to at most once per 20 ms.
const LEVEL_MESSAGE_INTERVAL_S: f32 = 0.020;

/// Event emitted by a `TriggerFilter` on a given tick. Emitted unconditionally —
/// muting is a wire-layer decision made by whatever forwards these to the OSC
/// emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerEvent {
    On,
    Off,
    Level(f32),
}

pub struct TriggerFilter {
    runtime: TriggerRuntime,
    last_level_emit_at: Option<SampleTime>,
}

impl TriggerFilter {
    pub fn new() -> Self {
        Self {
            runtime: TriggerRuntime::default(),
            last_level_emit_at: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.runtime.state
    }

    pub fn last_level(&self) -> f32 {
        self.runtime.last_level
    }

    /// Advance the state machine by one tick given the detector's level for this
    /// tick. Exactly one level message is considered per tick: forced (and
    /// flushed regardless of the rate limit) if this tick is the one that
    /// exits Active, rate-limited otherwise.
    pub fn tick(
        &mut self,
        def: &TriggerDefinition,
        level: f32,
        now: SampleTime,
        sample_rate: f32,
        events: &mut Vec<TriggerEvent>,
    ) {
        self.runtime.last_level = level;
        let was_active = self.runtime.state == TriggerState::Active;

        let max_hold_expired = was_active
            && def.max_hold_s > 0.0
            && now.saturating_sub(self.runtime.state_entered_at) >= to_samples(def.max_hold_s, sample_rate);
        let threshold_drop = was_active && level < def.threshold;
        let exiting_active = max_hold_expired || threshold_drop;

        if was_active {
            self.maybe_emit_level(def, now, sample_rate, events, exiting_active);
        }

        // Max-hold forces release even if the detector still asserts.
        if max_hold_expired {
            self.runtime.state = TriggerState::Idle;
            self.runtime.state_entered_at = now;
            events.push(TriggerEvent::Off);
        }

        // Off-delay expiry.
        if self.runtime.state == TriggerState::OffPending {
            let off_delay_samples = to_samples(def.off_delay_s, sample_rate);
            if now.saturating_sub(self.runtime.state_entered_at) >= off_delay_samples {
                self.runtime.state = TriggerState::Idle;
                self.runtime.state_entered_at = now;
                events.push(TriggerEvent::Off);
            }
        }

        if level >= def.threshold {
            self.trigger_on(now);
        } else {
            self.trigger_off(now);
        }

        // On-delay expiry. With `on_delay_s == 0` this fires the same tick a fresh
        // `trigger_on` moved Idle -> OnPending.
        if self.runtime.state == TriggerState::OnPending {
            let on_delay_samples = to_samples(def.on_delay_s, sample_rate);
            if now.saturating_sub(self.runtime.state_entered_at) >= on_delay_samples {
                self.runtime.state = TriggerState::Active;
                self.runtime.state_entered_at = now;
                events.push(TriggerEvent::On);
            }
        }
    }

    /// `trigger_on`: Idle -> OnPending; idempotent in OnPending/Active; cancels the
    /// off timer and returns to Active from OffPending.
    fn trigger_on(&mut self, now: SampleTime) {
        match self.runtime.state {
            TriggerState::Idle => {
                self.runtime.state = TriggerState::OnPending;
                self.runtime.state_entered_at = now;
            }
            TriggerState::OffPending => {
                self.runtime.state = TriggerState::Active;
                self.runtime.state_entered_at = now;
            }
            TriggerState::OnPending | TriggerState::Active => {}
        }
    }

    /// `trigger_off`: OnPending -> Idle; Active -> OffPending; idempotent in
    /// Idle/OffPending.
    fn trigger_off(&mut self, now: SampleTime) {
        match self.runtime.state {
            TriggerState::OnPending => {
                self.runtime.state = TriggerState::Idle;
                self.runtime.state_entered_at = now;
            }
            TriggerState::Active => {
                self.runtime.state = TriggerState::OffPending;
                self.runtime.state_entered_at = now;
            }
            TriggerState::Idle | TriggerState::OffPending => {}
        }
    }

    fn maybe_emit_level(
        &mut self,
        def: &TriggerDefinition,
        now: SampleTime,
        sample_rate: f32,
        events: &mut Vec<TriggerEvent>,
        force: bool,
    ) {
        if def.osc.level_msg.is_none() {
            return;
        }
        let interval_samples = to_samples(LEVEL_MESSAGE_INTERVAL_S, sample_rate);
        let due = force
            || self
                .last_level_emit_at
                .map_or(true, |t| now.saturating_sub(t) >= interval_samples);
        if due {
            let value = lerp(def.osc.level_min, def.osc.level_max, self.runtime.last_level);
            events.push(TriggerEvent::Level(value));
            self.last_level_emit_at = Some(now);
        }
    }
}

impl Default for TriggerFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_samples(seconds: f32, sample_rate: f32) -> SampleTime {
    (seconds * sample_rate).round() as SampleTime
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
