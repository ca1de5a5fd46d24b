//! OSC 1.0 packet and bundle encoding built on `rosc`'s wire types.

use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};

use sound2osc_types::OscTemplate;

/// The value carried by a templated message's single argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Float(f32),
    Int(i32),
    Text(String),
}

impl From<TemplateArg> for OscType {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Float(v) => OscType::Float(v),
            TemplateArg::Int(v) => OscType::Int(v),
            TemplateArg::Text(v) => OscType::String(v),
        }
    }
}

/// Build a single-argument OSC message from a template and a runtime value.
pub fn message_from_template(template: &OscTemplate, arg: TemplateArg) -> OscMessage {
    OscMessage {
        addr: template.address.clone(),
        args: vec![arg.into()],
    }
}

/// Encode one message as a bare (non-bundled) OSC packet.
pub fn encode_message(message: OscMessage) -> Result<Vec<u8>, rosc::OscError> {
    rosc::encoder::encode(&OscPacket::Message(message))
}

/// Encode several messages queued within the same tick as a single bundle, using
/// an "immediate" timetag (seconds = 0, fractional = 1, per OSC convention).
pub fn encode_bundle(messages: Vec<OscMessage>) -> Result<Vec<u8>, rosc::OscError> {
    let bundle = OscBundle {
        timetag: OscTime {
            seconds: 0,
            fractional: 1,
        },
        content: messages.into_iter().map(OscPacket::Message).collect(),
    };
    rosc::encoder::encode(&OscPacket::Bundle(bundle))
}

/// Encode a tick's worth of pending messages under OSC 1.0 rules: a bare
/// packet for exactly one message, a bundle for more than one.
pub fn encode_tick_output(messages: Vec<OscMessage>) -> Result<Vec<u8>, rosc::OscError> {
    if messages.len() == 1 {
        encode_message(messages.into_iter().next().unwrap())
    } else {
        encode_bundle(messages)
    }
}

/// Encode a tick's worth of pending messages under OSC 1.1 rules: every
/// message becomes its own bare packet — bundles are never used, regardless
/// of how many messages are pending in the tick.
pub fn encode_messages_unbundled(
    messages: Vec<OscMessage>,
) -> Result<Vec<Vec<u8>>, rosc::OscError> {
    messages.into_iter().map(encode_message).collect()
}

/// Decode a raw packet back to address + first argument, for tests and for the
/// inbound control router. Only the first argument is inspected; inbound
/// messages here are all single-argument.
pub fn decode_message(bytes: &[u8]) -> Result<OscMessage, rosc::OscError> {
    match rosc::decoder::decode_udp(bytes)?.1 {
        OscPacket::Message(m) => Ok(m),
        OscPacket::Bundle(_) => Err(rosc::OscError::BadPacket("expected a bare message, got a bundle")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_round_trips_address_and_argument() {
        let template = OscTemplate::new("/sound2osc/out/bass/level");
        let msg = message_from_template(&template, TemplateArg::Float(0.42));
        let bytes = encode_message(msg).unwrap();
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded.addr, "/sound2osc/out/bass/level");
        assert_eq!(decoded.args, vec![OscType::Float(0.42)]);
    }

    #[test]
    fn single_pending_message_is_not_wrapped_in_a_bundle() {
        let msg = OscMessage {
            addr: "/sound2osc/out/bass/on".into(),
            args: vec![OscType::Int(1)],
        };
        let bytes = encode_tick_output(vec![msg]).unwrap();
        // A bare message packet starts with the address, never "#bundle".
        assert!(!bytes.starts_with(b"#bundle"));
    }

    #[test]
    fn multiple_pending_messages_are_wrapped_in_a_bundle() {
        let a = OscMessage {
            addr: "/sound2osc/out/bass/on".into(),
            args: vec![OscType::Int(1)],
        };
        let b = OscMessage {
            addr: "/sound2osc/out/silence/off".into(),
            args: vec![OscType::Int(0)],
        };
        let bytes = encode_tick_output(vec![a, b]).unwrap();
        assert!(bytes.starts_with(b"#bundle\0"));
    }

    #[test]
    fn unbundled_encoding_never_produces_a_bundle_even_for_several_messages() {
        let a = OscMessage {
            addr: "/sound2osc/out/bass/on".into(),
            args: vec![OscType::Int(1)],
        };
        let b = OscMessage {
            addr: "/sound2osc/out/silence/off".into(),
            args: vec![OscType::Int(0)],
        };
        let packets = encode_messages_unbundled(vec![a, b]).unwrap();
        assert_eq!(packets.len(), 2);
        for packet in &packets {
            assert!(!packet.starts_with(b"#bundle"));
        }
    }
}
