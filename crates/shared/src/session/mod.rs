pub mod handshake;
pub mod keepalive;
pub mod manager;

use std::io;

use crate::net::{MessageError, SessionId};

pub use handshake::{ClientHandshake, ServerHandshake};
pub use keepalive::{DEFAULT_PING_INTERVAL, Keepalive, RttSample, RttSource, pong_for, unix_millis};
pub use manager::{SessionManager, SessionRecord};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no active session")]
    NotActive,
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Encode(#[from] MessageError),
    #[error("transport send failed: {0}")]
    Transport(#[from] io::Error),
}
