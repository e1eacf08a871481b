pub mod client;
pub mod net;
pub mod server;
pub mod session;
pub mod shutdown;

pub const DEFAULT_PORT: u16 = 7979;
pub const DEFAULT_TICK_RATE: u32 = 30;

pub use client::{ClientConfig, ClientEvent, ClientIntent, ClientSession, ConfigError};
pub use net::{
    Connector, DeliveryMode, DisconnectReason, Envelope, EnvelopeError, Message, MessageError,
    Opcode, PROTOCOL_VERSION, PeerId, SessionId, Transport, TransportEvent, UdpConfig,
    UdpTransport,
};
pub use server::{
    NoopWorld, ServerConfig, ServerCore, ServerEvent, SessionSend, TickDriver, TickHook,
};
pub use session::{ClientHandshake, SendError, ServerHandshake, SessionManager};
