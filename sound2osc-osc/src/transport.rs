//! Wire transports for encoded OSC packets: best-effort UDP and SLIP-framed TCP
//! with lazy, rate-limited reconnection.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

use crate::slip::encode_frame;

/// Minimum interval between reconnection attempts after a TCP failure.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// A TCP send may await socket writability subject to this cap (§5); past it
/// the write is abandoned, the message dropped, and a reconnect scheduled.
const WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// A destination for encoded OSC bytes. A failed `send` never panics; the
/// caller treats it as a dropped message and may emit a diagnostic.
pub trait Transport: Send {
    fn send(&mut self, bytes: &[u8]) -> bool;
}

pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket, target: SocketAddr) -> Self {
        Self { socket, target }
    }
}

impl Transport for UdpTransport {
    /// Best-effort: a failed send is swallowed, never retried.
    fn send(&mut self, bytes: &[u8]) -> bool {
        self.socket.send_to(bytes, self.target).is_ok()
    }
}

pub struct TcpSlipTransport {
    target: SocketAddr,
    stream: Option<TcpStream>,
    last_attempt: Option<Instant>,
}

impl TcpSlipTransport {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            stream: None,
            last_attempt: None,
        }
    }

    fn ensure_connected(&mut self) {
        if self.stream.is_some() {
            return;
        }
        let due = self
            .last_attempt
            .map_or(true, |t| t.elapsed() >= RECONNECT_BACKOFF);
        if !due {
            return;
        }
        self.last_attempt = Some(Instant::now());
        match TcpStream::connect(self.target) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));
                self.stream = Some(stream);
            }
            Err(e) => {
                log::warn!(target: "osc::transport", "TCP connect to {} failed: {}", self.target, e);
            }
        }
    }
}

impl Transport for TcpSlipTransport {
    fn send(&mut self, bytes: &[u8]) -> bool {
        self.ensure_connected();
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        let frame = encode_frame(bytes);
        match stream.write_all(&frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(target: "osc::transport", "TCP write failed, dropping connection: {}", e);
                self.stream = None;
                false
            }
        }
    }
}
