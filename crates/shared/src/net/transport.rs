use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Handshake and keepalive traffic. Never shared with gameplay traffic.
pub const CORE_CHANNEL: u8 = 0;
pub const GAMEPLAY_CHANNEL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Guaranteed eventual delivery, FIFO per channel.
    ReliableOrdered,
    Unreliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    LocalClosed,
    RemoteClosed,
    Timeout,
    ConnectionFailed,
    Rejected,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::LocalClosed => "closed locally",
            DisconnectReason::RemoteClosed => "closed by remote",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::ConnectionFailed => "connection failed",
            DisconnectReason::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected {
        peer: PeerId,
    },
    Disconnected {
        peer: PeerId,
        reason: DisconnectReason,
    },
    Received {
        peer: PeerId,
        channel: u8,
        data: Vec<u8>,
    },
    LatencyUpdated {
        peer: PeerId,
        rtt: Duration,
    },
}

/// The contract the session layer needs from a datagram transport.
///
/// Implementations may do I/O wherever they like, but every event reaches the
/// caller through `poll`, which must not block. All protocol state is owned by
/// whoever calls `poll`.
pub trait Transport {
    fn poll(&mut self) -> io::Result<Vec<TransportEvent>>;

    fn send(
        &mut self,
        peer: PeerId,
        channel: u8,
        mode: DeliveryMode,
        data: &[u8],
    ) -> io::Result<()>;

    fn disconnect(&mut self, peer: PeerId);

    fn rtt(&self, peer: PeerId) -> Option<Duration>;

    fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr>;
}

/// Transports that can dial out to a listening endpoint.
pub trait Connector: Transport {
    /// Starts connecting. The outcome arrives later through `poll` as
    /// `Connected` or `Disconnected` for the returned peer.
    fn connect(&mut self, addr: SocketAddr) -> io::Result<PeerId>;
}
