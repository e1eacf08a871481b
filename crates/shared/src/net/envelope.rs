use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use super::catalog::Opcode;

pub const PROTOCOL_VERSION: i32 = 1;

/// Outer wire structure: opcode tag, opaque payload, sender version.
///
/// The opcode is carried as a raw `u16` so that envelopes with tags this build
/// does not know still decode; see [`Envelope::opcode`].
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Envelope {
    pub opcode: u16,
    pub payload: Vec<u8>,
    pub version: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope serialization failed: {0}")]
    Encode(rancor::Error),
    #[error("envelope deserialization failed: {0}")]
    Decode(rancor::Error),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
}

impl Envelope {
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            opcode: opcode as u16,
            payload,
            version: PROTOCOL_VERSION,
        }
    }

    /// Resolves the raw tag. Receivers treat `UnknownOpcode` as "ignore", not
    /// as a fault, and never look at `version` when deciding.
    pub fn opcode(&self) -> Result<Opcode, EnvelopeError> {
        Opcode::try_from(self.opcode).map_err(|_| EnvelopeError::UnknownOpcode(self.opcode))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(EnvelopeError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, EnvelopeError> {
        // Datagram buffers carry no alignment guarantee; archived access needs one.
        let mut aligned: AlignedVec = AlignedVec::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(aligned.as_slice()).map_err(EnvelopeError::Decode)
    }
}

pub fn encode(opcode: Opcode, payload: &[u8], version: i32) -> Result<Vec<u8>, EnvelopeError> {
    Envelope {
        opcode: opcode as u16,
        payload: payload.to_vec(),
        version,
    }
    .encode()
}

pub fn decode(data: &[u8]) -> Result<Envelope, EnvelopeError> {
    Envelope::decode(data)
}
