use std::net::SocketAddr;

use crate::net::{DisconnectReason, Opcode, PeerId, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PeerConnected {
        peer: PeerId,
        addr: Option<SocketAddr>,
    },
    SessionStarted {
        peer: PeerId,
        session_id: SessionId,
        player_name: String,
        client_version: String,
    },
    SessionEnded {
        peer: PeerId,
        session_id: SessionId,
        reason: DisconnectReason,
    },
    PeerDisconnected {
        peer: PeerId,
        reason: DisconnectReason,
    },
    GameplayReceived {
        session_id: SessionId,
        opcode: Opcode,
    },
    DecodeFailed {
        peer: PeerId,
        error: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Writes the event to the log at the level it deserves.
    pub fn log(&self) {
        match self {
            ServerEvent::PeerConnected { peer, addr } => match addr {
                Some(addr) => log::info!("{} connected from {}", peer, addr),
                None => log::info!("{} connected", peer),
            },
            ServerEvent::SessionStarted {
                peer,
                session_id,
                player_name,
                client_version,
            } => {
                log::info!(
                    "{} ({} v{}) started session {}",
                    peer,
                    player_name,
                    client_version,
                    session_id
                );
            }
            ServerEvent::SessionEnded {
                peer,
                session_id,
                reason,
            } => {
                log::info!("Session {} of {} ended: {}", session_id, peer, reason);
            }
            ServerEvent::PeerDisconnected { peer, reason } => {
                log::info!("{} {}", peer, reason);
            }
            ServerEvent::GameplayReceived { session_id, opcode } => {
                log::trace!("{} from session {} (no world attached)", opcode, session_id);
            }
            ServerEvent::DecodeFailed { peer, error } => {
                log::info!("Dropped message from {}: {}", peer, error);
            }
            ServerEvent::Error { message } => {
                log::error!("{}", message);
            }
        }
    }
}
