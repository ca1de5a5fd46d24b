//! Routing of incoming OSC messages to the closed set of runtime-control
//! addresses the engine understands. Anything else is ignored.

use rosc::{OscMessage, OscPacket, OscType};

use sound2osc_types::TriggerId;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundControl {
    SetTriggerThreshold { id: TriggerId, threshold: f32 },
    LoadPreset { json: String },
    SetBpmMute(bool),
    BpmTap,
}

/// Parse an incoming message into an `InboundControl`, or `None` if the
/// address is unrecognized or the argument shape doesn't match.
pub fn route(message: &OscMessage) -> Option<InboundControl> {
    if let Some(name) = message
        .addr
        .strip_prefix("/sound2osc/in/trigger/")
        .and_then(|rest| rest.strip_suffix("/threshold"))
    {
        let id = TriggerId::ALL.into_iter().find(|id| id.as_str() == name)?;
        let threshold = first_float(message)?;
        return Some(InboundControl::SetTriggerThreshold { id, threshold });
    }

    match message.addr.as_str() {
        "/sound2osc/in/preset/load" => {
            let json = first_string(message)?;
            Some(InboundControl::LoadPreset { json })
        }
        "/sound2osc/in/bpm/mute" => {
            let flag = first_int(message)?;
            Some(InboundControl::SetBpmMute(flag != 0))
        }
        "/sound2osc/in/bpm/tap" => Some(InboundControl::BpmTap),
        _ => None,
    }
}

/// Flattens a (possibly bundled) packet into its routable controls,
/// discarding anything outside the closed address set.
pub fn route_packet(packet: &OscPacket) -> Vec<InboundControl> {
    match packet {
        OscPacket::Message(message) => route(message).into_iter().collect(),
        OscPacket::Bundle(bundle) => bundle.content.iter().flat_map(route_packet).collect(),
    }
}

fn first_float(message: &OscMessage) -> Option<f32> {
    match message.args.first()? {
        OscType::Float(v) => Some(*v),
        OscType::Int(v) => Some(*v as f32),
        _ => None,
    }
}

fn first_int(message: &OscMessage) -> Option<i32> {
    match message.args.first()? {
        OscType::Int(v) => Some(*v),
        _ => None,
    }
}

fn first_string(message: &OscMessage) -> Option<String> {
    match message.args.first()? {
        OscType::String(v) => Some(v.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_trigger_threshold_by_name() {
        let msg = OscMessage {
            addr: "/sound2osc/in/trigger/bass/threshold".into(),
            args: vec![OscType::Float(0.6)],
        };
        assert_eq!(
            route(&msg),
            Some(InboundControl::SetTriggerThreshold {
                id: TriggerId::Bass,
                threshold: 0.6
            })
        );
    }

    #[test]
    fn routes_bpm_tap_with_no_arguments() {
        let msg = OscMessage {
            addr: "/sound2osc/in/bpm/tap".into(),
            args: vec![],
        };
        assert_eq!(route(&msg), Some(InboundControl::BpmTap));
    }

    #[test]
    fn unknown_address_is_ignored() {
        let msg = OscMessage {
            addr: "/sound2osc/in/unknown".into(),
            args: vec![],
        };
        assert_eq!(route(&msg), None);
    }

    #[test]
    fn unknown_trigger_name_is_ignored() {
        let msg = OscMessage {
            addr: "/sound2osc/in/trigger/nope/threshold".into(),
            args: vec![OscType::Float(0.1)],
        };
        assert_eq!(route(&msg), None);
    }
}
