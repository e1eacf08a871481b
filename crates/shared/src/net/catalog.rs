use std::fmt;

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};
use uuid::Uuid;

use super::envelope::{Envelope, EnvelopeError};
use super::transport::{CORE_CHANNEL, DeliveryMode, GAMEPLAY_CHANNEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Hello = 1,
    HelloAck = 2,
    Ping = 3,
    Pong = 4,
    Move = 10,
    Snapshot = 11,
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::Hello),
            2 => Ok(Opcode::HelloAck),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            10 => Ok(Opcode::Move),
            11 => Ok(Opcode::Snapshot),
            other => Err(other),
        }
    }
}

impl Opcode {
    /// Row of [`CATALOG`] for this opcode. Rows are listed in tag order.
    pub fn entry(self) -> &'static CatalogEntry {
        let row = match self {
            Opcode::Hello => 0,
            Opcode::HelloAck => 1,
            Opcode::Ping => 2,
            Opcode::Pong => 3,
            Opcode::Move => 4,
            Opcode::Snapshot => 5,
        };
        &CATALOG[row]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Opcodes that only make sense once a session is established.
    pub fn is_gameplay(self) -> bool {
        matches!(self, Opcode::Move | Opcode::Snapshot)
    }

    pub fn channel(self) -> u8 {
        if self.is_gameplay() {
            GAMEPLAY_CHANNEL
        } else {
            CORE_CHANNEL
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("{opcode} payload serialization failed: {source}")]
    Encode {
        opcode: &'static str,
        source: rancor::Error,
    },
    #[error("{opcode} payload deserialization failed: {source}")]
    Decode {
        opcode: &'static str,
        source: rancor::Error,
    },
}

pub struct CatalogEntry {
    pub opcode: Opcode,
    pub name: &'static str,
    pub delivery: DeliveryMode,
    pub decode: fn(&[u8]) -> Result<Message, PayloadError>,
}

/// Opcode to payload codec bindings. Process-wide and immutable.
pub static CATALOG: [CatalogEntry; 6] = [
    CatalogEntry {
        opcode: Opcode::Hello,
        name: "Hello",
        delivery: DeliveryMode::ReliableOrdered,
        decode: decode_hello,
    },
    CatalogEntry {
        opcode: Opcode::HelloAck,
        name: "HelloAck",
        delivery: DeliveryMode::ReliableOrdered,
        decode: decode_hello_ack,
    },
    CatalogEntry {
        opcode: Opcode::Ping,
        name: "Ping",
        delivery: DeliveryMode::ReliableOrdered,
        decode: decode_ping,
    },
    CatalogEntry {
        opcode: Opcode::Pong,
        name: "Pong",
        delivery: DeliveryMode::ReliableOrdered,
        decode: decode_pong,
    },
    CatalogEntry {
        opcode: Opcode::Move,
        name: "Move",
        delivery: DeliveryMode::Unreliable,
        decode: decode_move,
    },
    CatalogEntry {
        opcode: Opcode::Snapshot,
        name: "Snapshot",
        delivery: DeliveryMode::Unreliable,
        decode: decode_snapshot,
    },
];

fn decode_hello(bytes: &[u8]) -> Result<Message, PayloadError> {
    Hello::decode(bytes).map(Message::Hello)
}

fn decode_hello_ack(bytes: &[u8]) -> Result<Message, PayloadError> {
    HelloAck::decode(bytes).map(Message::HelloAck)
}

fn decode_ping(bytes: &[u8]) -> Result<Message, PayloadError> {
    Ping::decode(bytes).map(Message::Ping)
}

fn decode_pong(bytes: &[u8]) -> Result<Message, PayloadError> {
    Pong::decode(bytes).map(Message::Pong)
}

fn decode_move(bytes: &[u8]) -> Result<Message, PayloadError> {
    Move::decode(bytes).map(Message::Move)
}

fn decode_snapshot(bytes: &[u8]) -> Result<Message, PayloadError> {
    Snapshot::decode(bytes).map(Message::Snapshot)
}

macro_rules! payload_codec {
    ($ty:ty, $name:literal) => {
        impl $ty {
            pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
                rkyv::to_bytes::<rancor::Error>(self)
                    .map(|aligned| aligned.into_vec())
                    .map_err(|source| PayloadError::Encode {
                        opcode: $name,
                        source,
                    })
            }

            pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
                let mut aligned: AlignedVec = AlignedVec::with_capacity(data.len());
                aligned.extend_from_slice(data);
                rkyv::from_bytes::<Self, rancor::Error>(aligned.as_slice()).map_err(|source| {
                    PayloadError::Decode {
                        opcode: $name,
                        source,
                    }
                })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    pub const NIL: SessionId = SessionId([0; 16]);

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_uuid().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Vec2> for [f32; 2] {
    fn from(v: Vec2) -> Self {
        [v.x, v.y]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Hello {
    pub player_name: String,
    pub client_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct HelloAck {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Ping {
    pub ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Pong {
    pub ticks: u64,
}

// Reserved gameplay schemas: part of the wire contract, not driven by anything yet.

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Move {
    pub player_id: SessionId,
    pub position: Vec2,
    pub direction: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerState {
    pub id: SessionId,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerState>,
}

payload_codec!(Hello, "Hello");
payload_codec!(HelloAck, "HelloAck");
payload_codec!(Ping, "Ping");
payload_codec!(Pong, "Pong");
payload_codec!(Move, "Move");
payload_codec!(PlayerState, "PlayerState");
payload_codec!(Snapshot, "Snapshot");

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(Hello),
    HelloAck(HelloAck),
    Ping(Ping),
    Pong(Pong),
    Move(Move),
    Snapshot(Snapshot),
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl Message {
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::Hello(_) => Opcode::Hello,
            Message::HelloAck(_) => Opcode::HelloAck,
            Message::Ping(_) => Opcode::Ping,
            Message::Pong(_) => Opcode::Pong,
            Message::Move(_) => Opcode::Move,
            Message::Snapshot(_) => Opcode::Snapshot,
        }
    }

    pub fn delivery(&self) -> DeliveryMode {
        self.opcode().entry().delivery
    }

    pub fn to_envelope(&self) -> Result<Envelope, PayloadError> {
        let payload = match self {
            Message::Hello(m) => m.encode()?,
            Message::HelloAck(m) => m.encode()?,
            Message::Ping(m) => m.encode()?,
            Message::Pong(m) => m.encode()?,
            Message::Move(m) => m.encode()?,
            Message::Snapshot(m) => m.encode()?,
        };
        Ok(Envelope::new(self.opcode(), payload))
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(self.to_envelope()?.encode()?)
    }

    /// Decodes the payload of an envelope whose opcode is known.
    pub fn decode(envelope: &Envelope) -> Result<Message, MessageError> {
        let opcode = envelope.opcode()?;
        Ok((opcode.entry().decode)(&envelope.payload)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Message, MessageError> {
        Message::decode(&Envelope::decode(data)?)
    }
}
