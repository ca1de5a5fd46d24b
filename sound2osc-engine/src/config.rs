//! Engine construction parameters. File I/O and preset directory management
//! live outside this crate; this struct only holds what the engine needs to
//! start ticking.

use std::net::SocketAddr;

/// Wire protocol mode; §4.8 "OSC 1.1 mode" forces SLIP-framed TCP with no
/// bundling regardless of how many messages a tick produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscProtocol {
    V1_0,
    V1_1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    TcpSlip,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub target_addr: SocketAddr,
    pub transport: TransportKind,
    pub protocol: OscProtocol,
    pub sample_rate: f32,
}

impl EngineConfig {
    pub fn udp(target_addr: SocketAddr) -> Self {
        Self {
            target_addr,
            transport: TransportKind::Udp,
            protocol: OscProtocol::V1_0,
            sample_rate: sound2osc_types::SAMPLE_RATE_HZ,
        }
    }

    pub fn tcp_slip_v1_1(target_addr: SocketAddr) -> Self {
        Self {
            target_addr,
            transport: TransportKind::TcpSlip,
            protocol: OscProtocol::V1_1,
            sample_rate: sound2osc_types::SAMPLE_RATE_HZ,
        }
    }

    /// OSC 1.1 mode always forces SLIP-framed TCP with no bundling: every
    /// pending message becomes its own packet regardless of tick size.
    pub fn is_osc_1_1(&self) -> bool {
        self.protocol == OscProtocol::V1_1
    }
}
