pub mod codec;
pub mod receiver;
pub mod router;
pub mod sender;
pub mod slip;
pub mod transport;

pub use codec::{
    encode_bundle, encode_message, encode_messages_unbundled, encode_tick_output,
    message_from_template, TemplateArg,
};
pub use receiver::OscReceiver;
pub use router::{route, route_packet, InboundControl};
pub use sender::OscSender;
pub use slip::{encode_frame, SlipDecoder};
pub use transport::{Transport, TcpSlipTransport, UdpTransport};
