//! Collects the OSC messages produced by one tick and hands pre-encoded bytes
//! to the sender thread. OSC 1.0 bundles more than one pending message into a
//! single packet; OSC 1.1 sends every message as its own bare, SLIP-framed
//! packet and never bundles (§4.8).

use rosc::OscMessage;

use sound2osc_osc::{encode_messages_unbundled, encode_tick_output, OscSender};

pub struct OscEmitter {
    sender: OscSender,
    osc_1_1: bool,
    pending: Vec<OscMessage>,
}

impl OscEmitter {
    pub fn new(sender: OscSender, osc_1_1: bool) -> Self {
        Self {
            sender,
            osc_1_1,
            pending: Vec::new(),
        }
    }

    /// Queue a message for emission at the end of the current tick.
    pub fn push(&mut self, message: OscMessage) {
        self.pending.push(message);
    }

    /// Current depth of the underlying send queue, for surfacing backpressure
    /// before a `TransportOverflow` diagnostic actually fires.
    pub fn queue_depth(&self) -> usize {
        self.sender.queue_depth()
    }

    /// Encode and send everything queued this tick. Returns `true` if every
    /// resulting packet was accepted by the send queue, `false` if any was
    /// dropped on overflow (caller should raise a diagnostic). A tick with
    /// nothing queued is a no-op.
    pub fn flush(&mut self) -> bool {
        if self.pending.is_empty() {
            return true;
        }
        let messages = std::mem::take(&mut self.pending);

        if self.osc_1_1 {
            match encode_messages_unbundled(messages) {
                Ok(packets) => {
                    let mut all_sent = true;
                    for packet in packets {
                        all_sent &= self.sender.try_send(packet);
                    }
                    all_sent
                }
                Err(e) => {
                    log::warn!(target: "engine::osc_emitter", "failed to encode tick output: {}", e);
                    false
                }
            }
        } else {
            match encode_tick_output(messages) {
                Ok(bytes) => self.sender.try_send(bytes),
                Err(e) => {
                    log::warn!(target: "engine::osc_emitter", "failed to encode tick output: {}", e);
                    false
                }
            }
        }
    }
}
