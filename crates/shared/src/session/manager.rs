use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::net::{PeerId, SessionId};

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub peer: PeerId,
    pub session_id: SessionId,
    pub started: Instant,
}

/// Owns every live peer session. Only the protocol thread touches it.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<PeerId, SessionRecord>,
    peers: HashMap<SessionId, PeerId>,
    issued: HashSet<SessionId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a session id for `peer`. A peer that already has one keeps it.
    pub fn on_handshake_complete(&mut self, peer: PeerId) -> SessionId {
        self.complete_with(peer, SessionId::new_v4)
    }

    fn complete_with(&mut self, peer: PeerId, mut draw: impl FnMut() -> SessionId) -> SessionId {
        if let Some(record) = self.sessions.get(&peer) {
            return record.session_id;
        }

        let session_id = loop {
            let candidate = draw();
            if !candidate.is_nil() && self.issued.insert(candidate) {
                break candidate;
            }
            log::warn!("Session id collision on {}, drawing again", candidate);
        };

        self.sessions.insert(
            peer,
            SessionRecord {
                peer,
                session_id,
                started: Instant::now(),
            },
        );
        self.peers.insert(session_id, peer);

        session_id
    }

    /// Removes and returns the peer's session, if a handshake ever completed.
    pub fn on_disconnect(&mut self, peer: PeerId) -> Option<SessionId> {
        let record = self.sessions.remove(&peer)?;
        self.peers.remove(&record.session_id);
        Some(record.session_id)
    }

    pub fn session_for(&self, peer: PeerId) -> Option<SessionId> {
        self.sessions.get(&peer).map(|r| r.session_id)
    }

    pub fn peer_for(&self, session_id: SessionId) -> Option<PeerId> {
        self.peers.get(&session_id).copied()
    }

    pub fn get(&self, peer: PeerId) -> Option<&SessionRecord> {
        self.sessions.get(&peer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.sessions.values()
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}
