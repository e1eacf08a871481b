use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use super::transport::{DeliveryMode, DisconnectReason, PeerId, Transport, TransportEvent};
use super::udp::MAX_PAYLOAD_SIZE;

/// One `send` as seen by the sending endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub peer: PeerId,
    pub channel: u8,
    pub mode: DeliveryMode,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct EndpointState {
    inbox: VecDeque<TransportEvent>,
    sent: Vec<SentDatagram>,
    rtt: HashMap<PeerId, Duration>,
}

#[derive(Debug, Default)]
struct Hub {
    endpoints: Vec<EndpointState>,
    /// (endpoint, local peer id) -> (remote endpoint, remote's id for us)
    links: HashMap<(usize, PeerId), (usize, PeerId)>,
    next_peer_id: u32,
}

impl Hub {
    fn allocate(&mut self) -> PeerId {
        self.next_peer_id += 1;
        PeerId(self.next_peer_id)
    }

    fn unlink(&mut self, index: usize, peer: PeerId) -> Option<(usize, PeerId)> {
        let remote = self.links.remove(&(index, peer))?;
        self.links.remove(&remote);
        Some(remote)
    }
}

/// In-process loopback network. Delivery is instant and lossless, FIFO per
/// endpoint, which satisfies both delivery modes.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> MemoryTransport {
        let mut hub = self.hub.borrow_mut();
        hub.endpoints.push(EndpointState::default());
        MemoryTransport {
            hub: Rc::clone(&self.hub),
            index: hub.endpoints.len() - 1,
        }
    }

    /// Links two endpoints and queues `Connected` on both. Returns the id each
    /// side uses for the other: `(a's id for b, b's id for a)`.
    pub fn connect(&self, a: &MemoryTransport, b: &MemoryTransport) -> (PeerId, PeerId) {
        let mut hub = self.hub.borrow_mut();
        let b_on_a = hub.allocate();
        let a_on_b = hub.allocate();

        hub.links.insert((a.index, b_on_a), (b.index, a_on_b));
        hub.links.insert((b.index, a_on_b), (a.index, b_on_a));

        hub.endpoints[a.index]
            .inbox
            .push_back(TransportEvent::Connected { peer: b_on_a });
        hub.endpoints[b.index]
            .inbox
            .push_back(TransportEvent::Connected { peer: a_on_b });

        (b_on_a, a_on_b)
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    hub: Rc<RefCell<Hub>>,
    index: usize,
}

impl MemoryTransport {
    /// Drains the record of everything this endpoint has sent.
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.hub.borrow_mut().endpoints[self.index].sent)
    }

    /// Queues raw bytes on this endpoint as if `peer` had sent them.
    pub fn inject(&self, peer: PeerId, channel: u8, data: Vec<u8>) {
        self.hub.borrow_mut().endpoints[self.index]
            .inbox
            .push_back(TransportEvent::Received {
                peer,
                channel,
                data,
            });
    }

    /// Pretends the link measured `rtt` and reports it on the next poll.
    pub fn report_latency(&self, peer: PeerId, rtt: Duration) {
        let mut hub = self.hub.borrow_mut();
        let endpoint = &mut hub.endpoints[self.index];
        endpoint.rtt.insert(peer, rtt);
        endpoint
            .inbox
            .push_back(TransportEvent::LatencyUpdated { peer, rtt });
    }

    /// Severs the link without a goodbye; both sides see `Timeout`.
    pub fn drop_link(&self, peer: PeerId) {
        let mut hub = self.hub.borrow_mut();
        if let Some((remote, remote_peer)) = hub.unlink(self.index, peer) {
            hub.endpoints[self.index]
                .inbox
                .push_back(TransportEvent::Disconnected {
                    peer,
                    reason: DisconnectReason::Timeout,
                });
            hub.endpoints[remote]
                .inbox
                .push_back(TransportEvent::Disconnected {
                    peer: remote_peer,
                    reason: DisconnectReason::Timeout,
                });
        }
    }

    pub fn is_linked(&self, peer: PeerId) -> bool {
        self.hub.borrow().links.contains_key(&(self.index, peer))
    }
}

impl Transport for MemoryTransport {
    fn poll(&mut self) -> io::Result<Vec<TransportEvent>> {
        let mut hub = self.hub.borrow_mut();
        Ok(hub.endpoints[self.index].inbox.drain(..).collect())
    }

    fn send(
        &mut self,
        peer: PeerId,
        channel: u8,
        mode: DeliveryMode,
        data: &[u8],
    ) -> io::Result<()> {
        // Same ceiling as the UDP adapter, so oversized messages fail here too.
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Payload exceeds MTU",
            ));
        }

        let mut hub = self.hub.borrow_mut();
        let Some(&(remote, remote_peer)) = hub.links.get(&(self.index, peer)) else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not connected", peer),
            ));
        };

        hub.endpoints[self.index].sent.push(SentDatagram {
            peer,
            channel,
            mode,
            data: data.to_vec(),
        });
        hub.endpoints[remote]
            .inbox
            .push_back(TransportEvent::Received {
                peer: remote_peer,
                channel,
                data: data.to_vec(),
            });

        Ok(())
    }

    fn disconnect(&mut self, peer: PeerId) {
        let mut hub = self.hub.borrow_mut();
        if let Some((remote, remote_peer)) = hub.unlink(self.index, peer) {
            hub.endpoints[self.index]
                .inbox
                .push_back(TransportEvent::Disconnected {
                    peer,
                    reason: DisconnectReason::LocalClosed,
                });
            hub.endpoints[remote]
                .inbox
                .push_back(TransportEvent::Disconnected {
                    peer: remote_peer,
                    reason: DisconnectReason::RemoteClosed,
                });
        }
    }

    fn rtt(&self, peer: PeerId) -> Option<Duration> {
        self.hub.borrow().endpoints[self.index].rtt.get(&peer).copied()
    }

    fn peer_addr(&self, _peer: PeerId) -> Option<SocketAddr> {
        None
    }
}
