use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use super::tracking::{OrderedReceiver, ReliableSender, RttEstimator};
use super::transport::{
    Connector, DeliveryMode, DisconnectReason, PeerId, Transport, TransportEvent,
};

pub const MAX_DATAGRAM_SIZE: usize = 1200;
/// Room left for the frame header inside one datagram.
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - 64;
pub const TRANSPORT_MAGIC: u32 = 0x4152_4E41;

#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub max_peers: usize,
    pub connect_retry: Duration,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub peer_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            max_peers: 64,
            connect_retry: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(1),
            peer_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Frame {
    ConnectRequest { nonce: u64 },
    ConnectAccept { nonce: u64 },
    ConnectDenied { reason: String },
    Reliable { channel: u8, ordinal: u32, bytes: Vec<u8> },
    Unreliable { channel: u8, bytes: Vec<u8> },
    Ack { channel: u8, ordinal: u32 },
    Heartbeat,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Datagram {
    pub magic: u32,
    pub frame: Frame,
}

#[derive(Debug, thiserror::Error)]
pub enum DatagramError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Datagram {
    pub fn new(frame: Frame) -> Self {
        Self {
            magic: TRANSPORT_MAGIC,
            frame,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == TRANSPORT_MAGIC
    }

    pub fn serialize(&self) -> Result<Vec<u8>, DatagramError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(DatagramError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DatagramError> {
        let mut aligned: AlignedVec = AlignedVec::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(aligned.as_slice())
            .map_err(DatagramError::Deserialize)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Connecting,
    Connected,
}

#[derive(Debug, Default)]
struct ChannelState {
    sender: ReliableSender,
    receiver: OrderedReceiver,
}

#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    nonce: u64,
    state: LinkState,
    started: Instant,
    last_receive: Instant,
    last_send: Instant,
    channels: HashMap<u8, ChannelState>,
    rtt: RttEstimator,
}

impl Peer {
    fn new(addr: SocketAddr, nonce: u64, state: LinkState, now: Instant) -> Self {
        Self {
            addr,
            nonce,
            state,
            started: now,
            last_receive: now,
            last_send: now,
            channels: HashMap::new(),
            rtt: RttEstimator::default(),
        }
    }
}

/// Non-blocking UDP endpoint with per-peer reliable-ordered channels.
///
/// A listening endpoint accepts `ConnectRequest`s; any endpoint can open
/// outbound links with [`UdpTransport::connect`]. Nothing here spawns threads:
/// socket reads, resends, heartbeats and timeouts all happen inside `poll`.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    config: UdpConfig,
    listening: bool,
    peers: HashMap<PeerId, Peer>,
    peers_by_addr: HashMap<SocketAddr, PeerId>,
    next_peer_id: u32,
    events: VecDeque<TransportEvent>,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A, config: UdpConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            config,
            listening: false,
            peers: HashMap::new(),
            peers_by_addr: HashMap::new(),
            next_peer_id: 1,
            events: VecDeque::new(),
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn listen<A: ToSocketAddrs>(addr: A, config: UdpConfig) -> io::Result<Self> {
        let mut transport = Self::bind(addr, config)?;
        transport.listening = true;
        Ok(transport)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Closes every link, telling each remote first.
    pub fn disconnect_all(&mut self) {
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in ids {
            self.disconnect(id);
        }
    }

    fn allocate_peer_id(&mut self) -> PeerId {
        let id = PeerId(self.next_peer_id);
        self.next_peer_id = self.next_peer_id.wrapping_add(1).max(1);
        id
    }

    fn remove_peer(&mut self, id: PeerId, reason: DisconnectReason) {
        if let Some(peer) = self.peers.remove(&id) {
            self.peers_by_addr.remove(&peer.addr);
            self.events
                .push_back(TransportEvent::Disconnected { peer: id, reason });
        }
    }

    fn receive_datagrams(&mut self, now: Instant) -> io::Result<()> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;

                    match Datagram::deserialize(&self.recv_buffer[..size]) {
                        Ok(datagram) if datagram.is_valid() => {
                            self.handle_frame(addr, datagram.frame, now);
                        }
                        Ok(_) => {
                            self.stats.packets_dropped += 1;
                            log::trace!("Dropping datagram with bad magic from {}", addr);
                        }
                        Err(e) => {
                            self.stats.packets_dropped += 1;
                            log::trace!("Dropping malformed datagram from {}: {}", addr, e);
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // ICMP unreachable surfaces here on some platforms; it concerns one peer only.
                Err(ref e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    log::warn!("Socket error on {}: {}", self.local_addr, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn handle_frame(&mut self, addr: SocketAddr, frame: Frame, now: Instant) {
        if let Frame::ConnectRequest { nonce } = frame {
            self.handle_connect_request(addr, nonce, now);
            return;
        }

        let Some(&id) = self.peers_by_addr.get(&addr) else {
            log::trace!("Ignoring frame from unknown address {}", addr);
            return;
        };
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        peer.last_receive = now;

        match frame {
            Frame::ConnectRequest { .. } => {}
            Frame::ConnectAccept { nonce } => {
                if peer.state == LinkState::Connecting && nonce == peer.nonce {
                    peer.state = LinkState::Connected;
                    self.events.push_back(TransportEvent::Connected { peer: id });
                }
            }
            Frame::ConnectDenied { reason } => {
                if peer.state == LinkState::Connecting {
                    log::warn!("Connection to {} denied: {}", addr, reason);
                    self.remove_peer(id, DisconnectReason::Rejected);
                }
            }
            Frame::Reliable {
                channel,
                ordinal,
                bytes,
            } => {
                if peer.state != LinkState::Connected {
                    return;
                }

                let state = peer.channels.entry(channel).or_default();
                let Some(ready) = state.receiver.accept(ordinal, bytes) else {
                    // Past the receive window: left unacked so the sender retries it.
                    log::trace!("Ordinal {} from {} is past the window", ordinal, id);
                    return;
                };

                // Duplicates are acked again; the first ack may have been lost.
                peer.last_send = now;
                if let Err(e) = send_datagram(
                    &self.socket,
                    &mut self.stats,
                    addr,
                    Frame::Ack { channel, ordinal },
                ) {
                    log::warn!("Failed to ack {} on {}: {}", ordinal, id, e);
                }

                for data in ready {
                    self.events.push_back(TransportEvent::Received {
                        peer: id,
                        channel,
                        data,
                    });
                }
            }
            Frame::Unreliable { channel, bytes } => {
                if peer.state == LinkState::Connected {
                    self.events.push_back(TransportEvent::Received {
                        peer: id,
                        channel,
                        data: bytes,
                    });
                }
            }
            Frame::Ack { channel, ordinal } => {
                let Some(state) = peer.channels.get_mut(&channel) else {
                    return;
                };
                if let Some(sample) = state.sender.process_ack(ordinal, now) {
                    peer.rtt.update(sample);
                    self.events.push_back(TransportEvent::LatencyUpdated {
                        peer: id,
                        rtt: peer.rtt.srtt(),
                    });
                }

                let ready = state.sender.take_ready(now);
                if !ready.is_empty() {
                    peer.last_send = now;
                    send_reliable(&self.socket, &mut self.stats, addr, channel, ready);
                }
            }
            Frame::Heartbeat => {}
            Frame::Disconnect => {
                self.remove_peer(id, DisconnectReason::RemoteClosed);
            }
        }
    }

    fn handle_connect_request(&mut self, addr: SocketAddr, nonce: u64, now: Instant) {
        if !self.listening {
            return;
        }

        if let Some(&id) = self.peers_by_addr.get(&addr) {
            let duplicate = self.peers.get(&id).is_some_and(|p| p.nonce == nonce);
            if duplicate {
                // Our accept was lost; answer again.
                if let Some(peer) = self.peers.get_mut(&id) {
                    peer.last_receive = now;
                    peer.last_send = now;
                }
                if let Err(e) = send_datagram(
                    &self.socket,
                    &mut self.stats,
                    addr,
                    Frame::ConnectAccept { nonce },
                ) {
                    log::warn!("Failed to re-accept {}: {}", addr, e);
                }
                return;
            }

            // Same address, new nonce: the remote restarted without saying goodbye.
            self.remove_peer(id, DisconnectReason::Timeout);
        }

        if self.peers.len() >= self.config.max_peers {
            log::info!("Denying connection from {}: server full", addr);
            if let Err(e) = send_datagram(
                &self.socket,
                &mut self.stats,
                addr,
                Frame::ConnectDenied {
                    reason: "Server full".to_string(),
                },
            ) {
                log::warn!("Failed to deny {}: {}", addr, e);
            }
            return;
        }

        let id = self.allocate_peer_id();
        self.peers
            .insert(id, Peer::new(addr, nonce, LinkState::Connected, now));
        self.peers_by_addr.insert(addr, id);

        if let Err(e) = send_datagram(
            &self.socket,
            &mut self.stats,
            addr,
            Frame::ConnectAccept { nonce },
        ) {
            log::warn!("Failed to accept {}: {}", addr, e);
        }

        self.events.push_back(TransportEvent::Connected { peer: id });
    }

    fn update_peers(&mut self, now: Instant) {
        let mut expired = Vec::new();

        for (&id, peer) in self.peers.iter_mut() {
            match peer.state {
                LinkState::Connecting => {
                    if now.duration_since(peer.started) >= self.config.connect_timeout {
                        expired.push((id, DisconnectReason::ConnectionFailed));
                        continue;
                    }
                    if now.duration_since(peer.last_send) >= self.config.connect_retry {
                        peer.last_send = now;
                        let frame = Frame::ConnectRequest { nonce: peer.nonce };
                        if let Err(e) =
                            send_datagram(&self.socket, &mut self.stats, peer.addr, frame)
                        {
                            log::warn!("Failed to send connect request to {}: {}", peer.addr, e);
                        }
                    }
                }
                LinkState::Connected => {
                    if now.duration_since(peer.last_receive) >= self.config.peer_timeout {
                        expired.push((id, DisconnectReason::Timeout));
                        continue;
                    }

                    let rto = peer.rtt.rto();
                    for (&channel, state) in peer.channels.iter_mut() {
                        for (ordinal, bytes) in state.sender.collect_resends(now, rto) {
                            peer.last_send = now;
                            let frame = Frame::Reliable {
                                channel,
                                ordinal,
                                bytes,
                            };
                            if let Err(e) =
                                send_datagram(&self.socket, &mut self.stats, peer.addr, frame)
                            {
                                log::warn!("Resend to {} failed: {}", id, e);
                            }
                        }
                    }

                    if now.duration_since(peer.last_send) >= self.config.heartbeat_interval {
                        peer.last_send = now;
                        if let Err(e) = send_datagram(
                            &self.socket,
                            &mut self.stats,
                            peer.addr,
                            Frame::Heartbeat,
                        ) {
                            log::warn!("Heartbeat to {} failed: {}", id, e);
                        }
                    }
                }
            }
        }

        for (id, reason) in expired {
            self.remove_peer(id, reason);
        }
    }
}

fn random_nonce() -> u64 {
    let (high, low) = uuid::Uuid::new_v4().as_u64_pair();
    high ^ low
}

fn send_datagram(
    socket: &UdpSocket,
    stats: &mut NetworkStats,
    addr: SocketAddr,
    frame: Frame,
) -> io::Result<usize> {
    let data = Datagram::new(frame).serialize().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )
    })?;

    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Datagram exceeds MTU",
        ));
    }

    let bytes = socket.send_to(&data, addr)?;

    stats.packets_sent += 1;
    stats.bytes_sent += bytes as u64;

    Ok(bytes)
}

/// First transmission of freshly numbered reliable messages. Failures are
/// only logged; the messages stay pending and go out again on resend.
fn send_reliable(
    socket: &UdpSocket,
    stats: &mut NetworkStats,
    addr: SocketAddr,
    channel: u8,
    ready: Vec<(u32, Vec<u8>)>,
) {
    for (ordinal, bytes) in ready {
        let frame = Frame::Reliable {
            channel,
            ordinal,
            bytes,
        };
        if let Err(e) = send_datagram(socket, stats, addr, frame) {
            log::warn!("Send of {} to {} failed, will retry: {}", ordinal, addr, e);
        }
    }
}

impl Transport for UdpTransport {
    fn poll(&mut self) -> io::Result<Vec<TransportEvent>> {
        let now = Instant::now();
        // On a socket fault, queued events stay put for the next poll.
        self.receive_datagrams(now)?;
        self.update_peers(now);

        Ok(self.events.drain(..).collect())
    }

    fn send(
        &mut self,
        peer: PeerId,
        channel: u8,
        mode: DeliveryMode,
        data: &[u8],
    ) -> io::Result<()> {
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Payload exceeds MTU",
            ));
        }

        let now = Instant::now();
        let link = self
            .peers
            .get_mut(&peer)
            .filter(|p| p.state == LinkState::Connected)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    format!("{} is not connected", peer),
                )
            })?;
        link.last_send = now;

        match mode {
            DeliveryMode::ReliableOrdered => {
                let state = link.channels.entry(channel).or_default();
                state.sender.push(data.to_vec());
                // Held back while the window is full; acks release it later.
                let ready = state.sender.take_ready(now);
                send_reliable(&self.socket, &mut self.stats, link.addr, channel, ready);
                Ok(())
            }
            DeliveryMode::Unreliable => {
                let frame = Frame::Unreliable {
                    channel,
                    bytes: data.to_vec(),
                };
                send_datagram(&self.socket, &mut self.stats, link.addr, frame).map(|_| ())
            }
        }
    }

    fn disconnect(&mut self, peer: PeerId) {
        let Some(addr) = self.peers.get(&peer).map(|p| p.addr) else {
            return;
        };
        if let Err(e) = send_datagram(&self.socket, &mut self.stats, addr, Frame::Disconnect) {
            log::warn!("Failed to notify {} of disconnect: {}", peer, e);
        }
        self.remove_peer(peer, DisconnectReason::LocalClosed);
    }

    fn rtt(&self, peer: PeerId) -> Option<Duration> {
        self.peers
            .get(&peer)
            .filter(|p| p.rtt.has_samples())
            .map(|p| p.rtt.srtt())
    }

    fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer).map(|p| p.addr)
    }
}

impl Connector for UdpTransport {
    fn connect(&mut self, addr: SocketAddr) -> io::Result<PeerId> {
        if let Some(&id) = self.peers_by_addr.get(&addr) {
            return Ok(id);
        }

        let now = Instant::now();
        let nonce = random_nonce();
        let id = self.allocate_peer_id();

        self.peers
            .insert(id, Peer::new(addr, nonce, LinkState::Connecting, now));
        self.peers_by_addr.insert(addr, id);

        log::debug!("Connecting {} to {}", id, addr);
        if let Err(e) = send_datagram(
            &self.socket,
            &mut self.stats,
            addr,
            Frame::ConnectRequest { nonce },
        ) {
            log::warn!("Failed to send connect request to {}: {}", addr, e);
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tracking::RECEIVE_WINDOW;

    #[test]
    fn test_datagram_serialization() {
        let datagram = Datagram::new(Frame::Reliable {
            channel: 0,
            ordinal: 7,
            bytes: vec![1, 2, 3],
        });

        let serialized = datagram.serialize().unwrap();
        let deserialized = Datagram::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, datagram);
        assert!(deserialized.is_valid());
    }

    #[test]
    fn test_malformed_datagram_rejected() {
        assert!(Datagram::deserialize(&[]).is_err());
        assert!(Datagram::deserialize(&[0xFF; 48]).is_err());
    }

    #[test]
    fn test_send_requires_connected_peer() {
        let mut transport = UdpTransport::bind("127.0.0.1:0", UdpConfig::default()).unwrap();
        let result = transport.send(PeerId(1), 0, DeliveryMode::ReliableOrdered, &[1]);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut transport = UdpTransport::bind("127.0.0.1:0", UdpConfig::default()).unwrap();
        let data = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = transport.send(PeerId(1), 0, DeliveryMode::Unreliable, &data);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_connect_times_out_without_server() {
        let config = UdpConfig {
            connect_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let mut transport = UdpTransport::bind("127.0.0.1:0", config).unwrap();
        // Bound, but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let peer = transport.connect(silent.local_addr().unwrap()).unwrap();

        std::thread::sleep(Duration::from_millis(80));
        let events = transport.poll().unwrap();

        assert!(events.contains(&TransportEvent::Disconnected {
            peer,
            reason: DisconnectReason::ConnectionFailed,
        }));
        assert_eq!(transport.peer_count(), 0);
    }

    /// Hand-driven remote that speaks raw frames, so tests can drop and
    /// reorder reliable traffic.
    struct RawPeer {
        socket: UdpSocket,
        target: SocketAddr,
    }

    impl RawPeer {
        fn connect(transport: &mut UdpTransport) -> (Self, PeerId) {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket
                .set_read_timeout(Some(Duration::from_millis(20)))
                .unwrap();
            let raw = Self {
                socket,
                target: transport.local_addr(),
            };

            raw.send(Frame::ConnectRequest { nonce: 42 });
            let peer = wait_for_events(transport)
                .into_iter()
                .find_map(|event| match event {
                    TransportEvent::Connected { peer } => Some(peer),
                    _ => None,
                })
                .unwrap();
            (raw, peer)
        }

        fn send(&self, frame: Frame) {
            let data = Datagram::new(frame).serialize().unwrap();
            self.socket.send_to(&data, self.target).unwrap();
        }

        fn send_ordinal(&self, ordinal: u32) {
            self.send(Frame::Reliable {
                channel: 0,
                ordinal,
                bytes: ordinal.to_le_bytes().to_vec(),
            });
        }

        /// Everything that arrived until the socket goes quiet.
        fn drain(&self) -> Vec<Frame> {
            let mut frames = Vec::new();
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            while let Ok((size, _)) = self.socket.recv_from(&mut buf) {
                frames.push(Datagram::deserialize(&buf[..size]).unwrap().frame);
            }
            frames
        }

        fn acked(&self) -> Vec<u32> {
            self.drain()
                .into_iter()
                .filter_map(|frame| match frame {
                    Frame::Ack { ordinal, .. } => Some(ordinal),
                    _ => None,
                })
                .collect()
        }
    }

    fn wait_for_events(transport: &mut UdpTransport) -> Vec<TransportEvent> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            let events = transport.poll().unwrap();
            if !events.is_empty() {
                return events;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        Vec::new()
    }

    fn delivered(events: Vec<TransportEvent>) -> Vec<u32> {
        events
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Received { data, .. } => {
                    Some(u32::from_le_bytes(data.try_into().unwrap()))
                }
                _ => None,
            })
            .collect()
    }

    fn reliable_ordinals(frames: Vec<Frame>) -> Vec<u32> {
        frames
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Reliable { ordinal, .. } => Some(ordinal),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reliable_reordered_past_window() {
        let mut transport = UdpTransport::listen("127.0.0.1:0", UdpConfig::default()).unwrap();
        let (raw, _) = RawPeer::connect(&mut transport);
        raw.drain();

        let total = RECEIVE_WINDOW + 45;
        let mut received = Vec::new();

        // Ordinal 0 is "lost"; everything after it arrives first.
        for ordinal in 1..total {
            raw.send_ordinal(ordinal);
            if ordinal % 32 == 0 {
                received.extend(delivered(transport.poll().unwrap()));
            }
        }
        std::thread::sleep(Duration::from_millis(20));
        received.extend(delivered(transport.poll().unwrap()));
        assert!(received.is_empty());

        let acked = raw.acked();
        assert_eq!(acked.len(), (RECEIVE_WINDOW - 1) as usize);
        assert!(acked.iter().all(|&ordinal| ordinal < RECEIVE_WINDOW));

        // The head shows up; the buffered window flushes in order.
        raw.send_ordinal(0);
        received.extend(delivered(wait_for_events(&mut transport)));
        assert_eq!(received, (0..RECEIVE_WINDOW).collect::<Vec<_>>());

        // Unacked ordinals are retried by the remote and now fit.
        for ordinal in RECEIVE_WINDOW..total {
            raw.send_ordinal(ordinal);
        }
        std::thread::sleep(Duration::from_millis(20));
        received.extend(delivered(transport.poll().unwrap()));
        assert_eq!(received, (0..total).collect::<Vec<_>>());

        let acked = raw.acked();
        assert!(acked.contains(&0));
        assert!(acked.contains(&(total - 1)));

        // A late duplicate is acked again but never delivered twice.
        raw.send_ordinal(5);
        std::thread::sleep(Duration::from_millis(20));
        assert!(delivered(transport.poll().unwrap()).is_empty());
        assert_eq!(raw.acked(), vec![5]);
    }

    #[test]
    fn test_reliable_resent_until_acked() {
        let mut transport = UdpTransport::listen("127.0.0.1:0", UdpConfig::default()).unwrap();
        let (raw, peer) = RawPeer::connect(&mut transport);
        raw.drain();

        let total = RECEIVE_WINDOW as usize + 10;
        for i in 0..total {
            transport
                .send(peer, 0, DeliveryMode::ReliableOrdered, &(i as u32).to_le_bytes())
                .unwrap();
        }

        // Only a full window goes out; nothing is acked, so it comes back after the RTO.
        let sent = reliable_ordinals(raw.drain());
        assert_eq!(sent, (0..RECEIVE_WINDOW).collect::<Vec<_>>());

        // Past the initial RTO (no samples yet).
        std::thread::sleep(Duration::from_millis(400));
        transport.poll().unwrap();
        let resent = reliable_ordinals(raw.drain());
        assert!(resent.contains(&0));
        assert!(resent.iter().all(|&ordinal| ordinal < RECEIVE_WINDOW));

        // Acking the head opens the window for the backlog.
        raw.send(Frame::Ack {
            channel: 0,
            ordinal: 0,
        });
        std::thread::sleep(Duration::from_millis(20));
        transport.poll().unwrap();
        let released = reliable_ordinals(raw.drain());
        assert_eq!(released, vec![RECEIVE_WINDOW]);
    }
}
