//! Dedicated OSC receive thread: a UDP socket is polled on a read-timeout
//! loop so the thread can be joined promptly on shutdown, decoded packets are
//! routed through [`crate::router::route`], and the resulting
//! [`InboundControl`] values are pushed to a bounded channel the engine drains
//! between ticks.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::router::{self, InboundControl};

/// How long a single `recv` call blocks before checking for shutdown again.
const RECV_TIMEOUT: Duration = Duration::from_millis(50);

/// Inbound UDP datagrams are never larger than this; OSC control messages are
/// a handful of bytes.
const RECV_BUF_LEN: usize = 4096;

/// Receive-queue capacity. Control messages arrive far slower than audio
/// ticks, so this is generous relative to the outbound send queue.
const CONTROL_QUEUE_CAPACITY: usize = 64;

/// Listens for inbound OSC-over-UDP control messages on a background thread.
pub struct OscReceiver {
    rx: Receiver<InboundControl>,
    decode_errors: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
    local_addr: std::net::SocketAddr,
}

impl OscReceiver {
    /// Bind `bind_addr` and start listening. `bind_addr` is typically
    /// `"0.0.0.0:<port>"`; pass port `0` to let the OS choose.
    pub fn bind(bind_addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let local_addr = socket.local_addr()?;

        let (tx, rx): (Sender<InboundControl>, Receiver<InboundControl>) =
            crossbeam_channel::bounded(CONTROL_QUEUE_CAPACITY);
        let decode_errors = Arc::new(AtomicUsize::new(0));
        let decode_errors_clone = decode_errors.clone();

        let handle = thread::Builder::new()
            .name("sound2osc-osc-receiver".into())
            .spawn(move || recv_loop(socket, tx, decode_errors_clone))
            .expect("failed to spawn sound2osc-osc-receiver thread");

        Ok(Self {
            rx,
            decode_errors,
            handle: Some(handle),
            local_addr,
        })
    }

    /// The address actually bound, useful when `bind_addr` requested an
    /// ephemeral port.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Drain every `InboundControl` decoded since the last call, in arrival
    /// order. Never blocks.
    pub fn drain(&self) -> Vec<InboundControl> {
        self.rx.try_iter().collect()
    }

    /// Total packets that failed to decode as valid OSC since this receiver
    /// was created. The engine compares successive reads to raise one
    /// `ProtocolDecode` diagnostic per malformed packet (§7).
    pub fn decode_error_count(&self) -> usize {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

/// Stops the receive thread: dropping the socket (via the loop's exit, once
/// the next timeout elapses) lets `recv` return and the thread fall off the
/// end of `recv_loop`, then `tx` drops and `rx.try_iter()` goes empty.
impl Drop for OscReceiver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn recv_loop(socket: UdpSocket, tx: Sender<InboundControl>, decode_errors: Arc<AtomicUsize>) {
    let mut buf = [0u8; RECV_BUF_LEN];
    loop {
        match socket.recv(&mut buf) {
            Ok(n) => match rosc::decoder::decode_udp(&buf[..n]) {
                Ok((_, packet)) => {
                    for control in router::route_packet(&packet) {
                        if tx.send(control).is_err() {
                            return;
                        }
                    }
                }
                Err(_) => {
                    decode_errors.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{encoder, OscMessage, OscPacket, OscType};
    use std::net::UdpSocket as ClientSocket;
    use std::time::Duration as StdDuration;

    #[test]
    fn decodes_and_routes_a_single_message() {
        let receiver = OscReceiver::bind("127.0.0.1:0").unwrap();
        let client = ClientSocket::bind("127.0.0.1:0").unwrap();

        let packet = OscPacket::Message(OscMessage {
            addr: "/sound2osc/in/bpm/tap".into(),
            args: vec![],
        });
        let bytes = encoder::encode(&packet).unwrap();
        client.send_to(&bytes, receiver.local_addr()).unwrap();

        let controls = wait_for_at_least(&receiver, 1);
        assert_eq!(controls, vec![InboundControl::BpmTap]);
    }

    #[test]
    fn routes_every_message_inside_a_bundle() {
        let receiver = OscReceiver::bind("127.0.0.1:0").unwrap();
        let client = ClientSocket::bind("127.0.0.1:0").unwrap();

        let bundle = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                OscPacket::Message(OscMessage {
                    addr: "/sound2osc/in/bpm/tap".into(),
                    args: vec![],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/sound2osc/in/bpm/mute".into(),
                    args: vec![OscType::Int(1)],
                }),
            ],
        });
        let bytes = encoder::encode(&bundle).unwrap();
        client.send_to(&bytes, receiver.local_addr()).unwrap();

        let controls = wait_for_at_least(&receiver, 2);
        assert_eq!(
            controls,
            vec![InboundControl::BpmTap, InboundControl::SetBpmMute(true)]
        );
    }

    #[test]
    fn unparseable_bytes_are_dropped_but_counted() {
        let receiver = OscReceiver::bind("127.0.0.1:0").unwrap();
        let client = ClientSocket::bind("127.0.0.1:0").unwrap();

        client.send_to(&[0xff, 0x00, 0x01], receiver.local_addr()).unwrap();
        let deadline = std::time::Instant::now() + StdDuration::from_secs(2);
        while receiver.decode_error_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(StdDuration::from_millis(10));
        }
        assert!(receiver.drain().is_empty());
        assert_eq!(receiver.decode_error_count(), 1);
    }

    fn wait_for_at_least(receiver: &OscReceiver, n: usize) -> Vec<InboundControl> {
        let deadline = std::time::Instant::now() + StdDuration::from_secs(2);
        let mut collected = Vec::new();
        while collected.len() < n && std::time::Instant::now() < deadline {
            collected.extend(receiver.drain());
            if collected.len() < n {
                std::thread::sleep(StdDuration::from_millis(10));
            }
        }
        collected
    }
}
