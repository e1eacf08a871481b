mod config;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::net::{
    Connector, DisconnectReason, Envelope, Message, Move, PeerId, SessionId, Transport,
    TransportEvent, Vec2,
};
use crate::session::{ClientHandshake, Keepalive, RttSample, SendError, unix_millis};

pub use config::{ClientConfig, ConfigError};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientIntent {
    /// Ping right away instead of waiting for the schedule.
    Ping,
    Move { position: Vec2, direction: Vec2 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    SessionEstablished { session_id: SessionId },
    Pong { rtt_ms: u64 },
    Disconnected { reason: DisconnectReason },
}

/// Client half of the protocol: handshake, keepalive and outbound intents,
/// driven by the host calling [`ClientSession::poll_once`] every frame.
pub struct ClientSession<T: Transport> {
    transport: T,
    config: ClientConfig,
    server: Option<PeerId>,
    handshake: ClientHandshake,
    keepalive: Keepalive,
    events: Vec<ClientEvent>,
}

impl<T: Transport> ClientSession<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let keepalive = Keepalive::new(config.ping_interval);
        Self {
            transport,
            config,
            server: None,
            handshake: ClientHandshake::default(),
            keepalive,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> ClientHandshake {
        self.handshake
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.handshake.session_id()
    }

    pub fn is_active(&self) -> bool {
        self.handshake.is_active()
    }

    pub fn rtt(&self) -> Option<RttSample> {
        self.keepalive.rtt()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn poll_once(&mut self) -> Vec<ClientEvent> {
        self.poll_once_at(Instant::now())
    }

    /// One frame of protocol work. Safe to call at any rate, including
    /// before anything is connected.
    pub fn poll_once_at(&mut self, now: Instant) -> Vec<ClientEvent> {
        match self.transport.poll() {
            Ok(events) => {
                for event in events {
                    self.handle_transport_event(event, now);
                }
            }
            Err(e) => log::warn!("Transport poll failed: {}", e),
        }

        if self.handshake.is_active() {
            if let Some(ping) = self.keepalive.poll(now, unix_millis()) {
                log::trace!("Sending ping {}", ping.ticks);
                if let Err(e) = self.send(&Message::Ping(ping)) {
                    log::warn!("Failed to send ping: {}", e);
                }
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Queues an outbound intent. Refused unless the session is active.
    pub fn submit(&mut self, intent: ClientIntent) -> Result<(), SendError> {
        let session_id = self.handshake.session_id().ok_or(SendError::NotActive)?;

        let message = match intent {
            ClientIntent::Ping => Message::Ping(self.keepalive.ping_now(unix_millis())),
            ClientIntent::Move {
                position,
                direction,
            } => Message::Move(Move {
                player_id: session_id,
                position,
                direction,
            }),
        };

        self.send(&message)
    }

    /// Closes the link. `Disconnected` is reported by a later poll.
    pub fn disconnect(&mut self) {
        if let Some(peer) = self.server {
            self.transport.disconnect(peer);
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), SendError> {
        let peer = self.server.ok_or(SendError::NotActive)?;
        let bytes = message.encode()?;
        let opcode = message.opcode();
        self.transport
            .send(peer, opcode.channel(), message.delivery(), &bytes)?;
        Ok(())
    }

    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connected { peer } => {
                if self.server.is_some_and(|server| server != peer) {
                    log::debug!("Ignoring connection from unexpected {}", peer);
                    return;
                }
                self.server = Some(peer);
                self.events.push(ClientEvent::Connected);

                if self.handshake.on_connected() {
                    let hello = self.config.hello();
                    if let Err(e) = self.send(&hello) {
                        // No HelloAck can ever arrive; give the link up.
                        log::error!("Failed to send hello, disconnecting: {}", e);
                        self.disconnect();
                    }
                }
            }
            TransportEvent::Disconnected { peer, reason } => {
                if self.server != Some(peer) {
                    return;
                }
                self.server = None;
                self.handshake.on_disconnected();
                self.keepalive.deactivate();
                self.events.push(ClientEvent::Disconnected { reason });
            }
            TransportEvent::Received { peer, data, .. } => {
                if self.server == Some(peer) {
                    self.handle_datagram(&data, now);
                }
            }
            TransportEvent::LatencyUpdated { peer, rtt } => {
                if self.server == Some(peer) {
                    self.keepalive.on_latency_sample(rtt);
                }
            }
        }
    }

    fn handle_datagram(&mut self, data: &[u8], now: Instant) {
        let envelope = match Envelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::info!("Dropping malformed message: {}", e);
                return;
            }
        };

        if let Err(e) = envelope.opcode() {
            log::debug!("Ignoring message: {}", e);
            return;
        }

        let message = match Message::decode(&envelope) {
            Ok(message) => message,
            Err(e) => {
                log::info!("Dropping undecodable message: {}", e);
                return;
            }
        };

        match message {
            Message::HelloAck(ack) => {
                if self.handshake.on_hello_ack(ack.session_id) {
                    self.keepalive.activate(now);
                    self.events.push(ClientEvent::SessionEstablished {
                        session_id: ack.session_id,
                    });
                } else {
                    log::debug!("Ignoring HelloAck in state {}", self.handshake.name());
                }
            }
            Message::Pong(pong) if self.handshake.is_active() => {
                let rtt = self.keepalive.on_pong(pong, unix_millis());
                self.events.push(ClientEvent::Pong {
                    rtt_ms: duration_millis(rtt),
                });
            }
            other => {
                log::debug!(
                    "Ignoring {} in state {}",
                    other.opcode(),
                    self.handshake.name()
                );
            }
        }
    }
}

impl<T: Connector> ClientSession<T> {
    /// Dials the server and restarts the handshake.
    pub fn connect(&mut self, addr: SocketAddr) -> std::io::Result<()> {
        log::info!("Connecting to {}", addr);
        self.handshake.restart();
        self.keepalive.deactivate();
        self.server = Some(self.transport.connect(addr)?);
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
