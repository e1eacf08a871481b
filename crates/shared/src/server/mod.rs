mod config;
mod events;
mod tick;

use std::collections::{HashMap, VecDeque};
use std::io;

use crate::net::{
    CORE_CHANNEL, DeliveryMode, Envelope, HelloAck, Message, MessageError, PeerId, SessionId,
    Transport, TransportEvent,
};
use crate::session::{SendError, ServerHandshake, SessionManager, pong_for};

pub use config::ServerConfig;
pub use events::ServerEvent;
pub use tick::{NoopWorld, SessionSend, TickDriver, TickHook};

/// Server half of the protocol. Owns the transport, every peer's handshake
/// state and the session table; nothing else mutates them.
pub struct ServerCore<T: Transport> {
    transport: T,
    peers: HashMap<PeerId, ServerHandshake>,
    sessions: SessionManager,
    pending_events: VecDeque<ServerEvent>,
}

impl<T: Transport> ServerCore<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            peers: HashMap::new(),
            sessions: SessionManager::new(),
            pending_events: VecDeque::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn handshake(&self, peer: PeerId) -> Option<ServerHandshake> {
        self.peers.get(&peer).copied()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Polls the transport once and routes everything it reported.
    pub fn pump(&mut self) -> io::Result<usize> {
        let events = self.transport.poll()?;
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        Ok(count)
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer } => {
                self.peers.insert(peer, ServerHandshake::AwaitingHello);
                self.pending_events.push_back(ServerEvent::PeerConnected {
                    peer,
                    addr: self.transport.peer_addr(peer),
                });
            }
            TransportEvent::Disconnected { peer, reason } => {
                self.peers.remove(&peer);
                if let Some(session_id) = self.sessions.on_disconnect(peer) {
                    self.pending_events.push_back(ServerEvent::SessionEnded {
                        peer,
                        session_id,
                        reason,
                    });
                }
                self.pending_events
                    .push_back(ServerEvent::PeerDisconnected { peer, reason });
            }
            TransportEvent::Received { peer, data, .. } => {
                self.handle_datagram(peer, &data);
            }
            TransportEvent::LatencyUpdated { peer, rtt } => {
                log::trace!("{} rtt {:?}", peer, rtt);
            }
        }
    }

    fn handle_datagram(&mut self, peer: PeerId, data: &[u8]) {
        let envelope = match Envelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.decode_failed(peer, e.to_string());
                return;
            }
        };

        let opcode = match envelope.opcode() {
            Ok(opcode) => opcode,
            Err(e) => {
                log::debug!("Ignoring message from {}: {}", peer, e);
                return;
            }
        };

        let Some(state) = self.peers.get(&peer).copied() else {
            log::debug!("Ignoring {} from unknown {}", opcode, peer);
            return;
        };
        if !state.admits(opcode) {
            log::debug!("Ignoring {} from {} in state {}", opcode, peer, state.name());
            return;
        }

        let message = match Message::decode(&envelope) {
            Ok(message) => message,
            Err(e) => {
                self.decode_failed(peer, e.to_string());
                return;
            }
        };

        match message {
            Message::Hello(hello) => {
                let session_id = self.sessions.on_handshake_complete(peer);
                if let Some(state) = self.peers.get_mut(&peer) {
                    state.activate(session_id);
                }

                let ack = Message::HelloAck(HelloAck { session_id });
                if let Err(e) = self.send_to_peer(peer, &ack) {
                    self.pending_events.push_back(ServerEvent::Error {
                        message: format!("Failed to send HelloAck to {}: {}", peer, e),
                    });
                }

                self.pending_events.push_back(ServerEvent::SessionStarted {
                    peer,
                    session_id,
                    player_name: hello.player_name,
                    client_version: hello.client_version,
                });
            }
            Message::Ping(_) => {
                if let Err(e) = self.send_pong(peer, &envelope) {
                    log::warn!("Failed to answer ping from {}: {}", peer, e);
                }
            }
            Message::Move(_) | Message::Snapshot(_) => {
                if let Some(session_id) = state.session_id() {
                    self.pending_events
                        .push_back(ServerEvent::GameplayReceived { session_id, opcode });
                }
            }
            Message::HelloAck(_) | Message::Pong(_) => {}
        }
    }

    fn decode_failed(&mut self, peer: PeerId, error: String) {
        self.pending_events
            .push_back(ServerEvent::DecodeFailed { peer, error });
    }

    fn send_pong(&mut self, peer: PeerId, ping: &Envelope) -> Result<(), SendError> {
        let bytes = pong_for(ping).encode().map_err(MessageError::from)?;
        self.transport
            .send(peer, CORE_CHANNEL, DeliveryMode::ReliableOrdered, &bytes)?;
        Ok(())
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) -> Result<(), SendError> {
        let bytes = message.encode()?;
        self.transport.send(
            peer,
            message.opcode().channel(),
            message.delivery(),
            &bytes,
        )?;
        Ok(())
    }

    /// Closes every peer link, e.g. on shutdown.
    pub fn disconnect_all(&mut self) {
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer in peers {
            self.transport.disconnect(peer);
        }
    }
}

impl<T: Transport> SessionSend for ServerCore<T> {
    fn send_to_session(
        &mut self,
        session_id: SessionId,
        message: &Message,
        mode: DeliveryMode,
    ) -> Result<(), SendError> {
        let peer = self
            .sessions
            .peer_for(session_id)
            .ok_or(SendError::UnknownSession(session_id))?;
        let bytes = message.encode()?;
        self.transport
            .send(peer, message.opcode().channel(), mode, &bytes)?;
        Ok(())
    }

    fn broadcast(&mut self, message: &Message, mode: DeliveryMode) -> Result<usize, SendError> {
        let bytes = message.encode()?;
        let channel = message.opcode().channel();
        let peers: Vec<PeerId> = self.sessions.iter().map(|r| r.peer).collect();

        let mut delivered = 0;
        for peer in peers {
            match self.transport.send(peer, channel, mode, &bytes) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Broadcast to {} failed: {}", peer, e),
            }
        }
        Ok(delivered)
    }

    fn sessions(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|r| r.session_id).collect()
    }
}
