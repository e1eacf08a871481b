pub mod catalog;
pub mod envelope;
pub mod memory;
pub mod tracking;
pub mod transport;
pub mod udp;

pub use catalog::{
    CATALOG, CatalogEntry, Hello, HelloAck, Message, MessageError, Move, Opcode, PayloadError,
    Ping, PlayerState, Pong, SessionId, Snapshot, Vec2,
};
pub use envelope::{Envelope, EnvelopeError, PROTOCOL_VERSION};
pub use memory::{MemoryNetwork, MemoryTransport, SentDatagram};
pub use tracking::{OrderedReceiver, ReliableSender, RttEstimator};
pub use transport::{
    CORE_CHANNEL, Connector, DeliveryMode, DisconnectReason, GAMEPLAY_CHANNEL, PeerId, Transport,
    TransportEvent,
};
pub use udp::{MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE, NetworkStats, UdpConfig, UdpTransport};
