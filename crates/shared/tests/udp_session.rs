use std::thread;
use std::time::{Duration, Instant};

use arena::net::{CORE_CHANNEL, DeliveryMode, Envelope, Opcode, Ping, Pong};
use arena::session::unix_millis;
use arena::{
    ClientConfig, ClientEvent, ClientHandshake, ClientIntent, ClientSession, Connector,
    DisconnectReason, Message, ServerCore, ServerEvent, ServerHandshake, SessionSend, Transport,
    TransportEvent, UdpConfig, UdpTransport,
};

fn server() -> ServerCore<UdpTransport> {
    ServerCore::new(UdpTransport::listen("127.0.0.1:0", UdpConfig::default()).unwrap())
}

fn client(server: &ServerCore<UdpTransport>, config: ClientConfig) -> ClientSession<UdpTransport> {
    let transport = UdpTransport::bind("127.0.0.1:0", UdpConfig::default()).unwrap();
    let mut session = ClientSession::new(transport, config);
    session.connect(server.transport().local_addr()).unwrap();
    session
}

/// Drives both sides until `done` holds or the timeout passes.
fn pump_until(
    server: &mut ServerCore<UdpTransport>,
    client: &mut ClientSession<UdpTransport>,
    timeout_ms: u64,
    mut done: impl FnMut(&ServerCore<UdpTransport>, &ClientSession<UdpTransport>, &[ClientEvent]) -> bool,
) -> Vec<ClientEvent> {
    let start = Instant::now();
    let mut seen = Vec::new();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        server.pump().unwrap();
        seen.extend(client.poll_once());
        if done(server, client, &seen) {
            return seen;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached within {timeout_ms}ms, client events: {seen:?}");
}

#[test]
fn test_handshake_over_udp() {
    let mut server = server();
    let mut client = client(&server, ClientConfig::default());

    let events = pump_until(&mut server, &mut client, 2000, |_, c, _| c.is_active());

    assert_eq!(events.first(), Some(&ClientEvent::Connected));
    let session_id = client.session_id().unwrap();
    assert!(!session_id.is_nil());
    assert!(events.contains(&ClientEvent::SessionEstablished { session_id }));

    assert_eq!(server.sessions().len(), 1);
    let record = server.sessions().iter().next().unwrap();
    assert_eq!(record.session_id, session_id);
    assert_eq!(
        server.handshake(record.peer),
        Some(ServerHandshake::Active { session_id })
    );

    let started: Vec<ServerEvent> = server
        .drain_events()
        .filter(|e| matches!(e, ServerEvent::SessionStarted { .. }))
        .collect();
    assert_eq!(started.len(), 1);
}

#[test]
fn test_ping_pong_over_udp() {
    let mut server = server();
    let mut client = client(&server, ClientConfig::default());
    pump_until(&mut server, &mut client, 2000, |_, c, _| c.is_active());

    client.submit(ClientIntent::Ping).unwrap();
    let events = pump_until(&mut server, &mut client, 2000, |_, _, seen| {
        seen.iter().any(|e| matches!(e, ClientEvent::Pong { .. }))
    });

    assert!(events.iter().any(|e| matches!(e, ClientEvent::Pong { .. })));
    assert!(client.rtt().is_some());
}

#[test]
fn test_scheduled_pings_start_after_handshake() {
    let mut server = server();
    let config = ClientConfig {
        ping_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let mut client = client(&server, config);

    let events = pump_until(&mut server, &mut client, 3000, |_, _, seen| {
        seen.iter().filter(|e| matches!(e, ClientEvent::Pong { .. })).count() >= 2
    });

    let established = events
        .iter()
        .position(|e| matches!(e, ClientEvent::SessionEstablished { .. }))
        .unwrap();
    let first_pong = events
        .iter()
        .position(|e| matches!(e, ClientEvent::Pong { .. }))
        .unwrap();
    assert!(established < first_pong);
}

#[test]
fn test_garbage_does_not_disturb_other_peers() {
    let mut server = server();
    let server_addr = server.transport().local_addr();

    let mut rogue = UdpTransport::bind("127.0.0.1:0", UdpConfig::default()).unwrap();
    let rogue_peer = rogue.connect(server_addr).unwrap();
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        server.pump().unwrap();
        if rogue
            .poll()
            .unwrap()
            .contains(&TransportEvent::Connected { peer: rogue_peer })
        {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    let garbage: Vec<u8> = (0..40u32).map(|i| (i * 131 + 17) as u8).collect();
    rogue
        .send(rogue_peer, CORE_CHANNEL, DeliveryMode::ReliableOrdered, &garbage)
        .unwrap();

    let mut client = client(&server, ClientConfig::default());
    pump_until(&mut server, &mut client, 2000, |s, c, _| {
        c.is_active() && s.peer_count() == 2
    });

    let decode_failures = server
        .drain_events()
        .filter(|e| matches!(e, ServerEvent::DecodeFailed { .. }))
        .count();
    assert_eq!(decode_failures, 1);
    assert_eq!(server.sessions().len(), 1);
}

#[test]
fn test_pong_payload_identical_over_udp() {
    let mut server = server();
    let server_addr = server.transport().local_addr();
    let mut raw = UdpTransport::bind("127.0.0.1:0", UdpConfig::default()).unwrap();
    let peer = raw.connect(server_addr).unwrap();

    let ping = Message::Ping(Ping { ticks: 1000 }).to_envelope().unwrap();
    let mut sent = false;
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        server.pump().unwrap();
        for event in raw.poll().unwrap() {
            match event {
                TransportEvent::Connected { .. } => {
                    raw.send(
                        peer,
                        CORE_CHANNEL,
                        DeliveryMode::ReliableOrdered,
                        &ping.encode().unwrap(),
                    )
                    .unwrap();
                    sent = true;
                }
                TransportEvent::Received { data, .. } => {
                    let pong = Envelope::decode(&data).unwrap();
                    assert_eq!(pong.opcode().unwrap(), Opcode::Pong);
                    assert_eq!(pong.payload, ping.payload);
                    return;
                }
                _ => {}
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("no pong received (ping sent: {sent})");
}

#[test]
fn test_client_disconnect_cleans_up_server() {
    let mut server = server();
    let mut client = client(&server, ClientConfig::default());
    pump_until(&mut server, &mut client, 2000, |_, c, _| c.is_active());
    let session_id = client.session_id().unwrap();

    client.disconnect();
    let events = client.poll_once();
    assert!(events.contains(&ClientEvent::Disconnected {
        reason: DisconnectReason::LocalClosed
    }));
    assert_eq!(client.state(), ClientHandshake::Disconnected);

    let start = Instant::now();
    while !server.sessions().is_empty() && start.elapsed() < Duration::from_secs(2) {
        server.pump().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    assert!(server.sessions().is_empty());
    assert_eq!(server.sessions().peer_for(session_id), None);
}

#[test]
fn test_server_full_rejects_client() {
    let config = UdpConfig {
        max_peers: 1,
        ..Default::default()
    };
    let mut server = ServerCore::new(UdpTransport::listen("127.0.0.1:0", config).unwrap());

    let mut first = client(&server, ClientConfig::default());
    pump_until(&mut server, &mut first, 2000, |_, c, _| c.is_active());

    let mut second = client(&server, ClientConfig::default());
    let events = pump_until(&mut server, &mut second, 2000, |_, _, seen| {
        seen.iter()
            .any(|e| matches!(e, ClientEvent::Disconnected { .. }))
    });

    assert!(events.contains(&ClientEvent::Disconnected {
        reason: DisconnectReason::Rejected
    }));
    assert_eq!(server.sessions().len(), 1);
}

#[test]
fn test_broadcast_reaches_active_sessions() {
    let mut server = server();
    let mut client = client(&server, ClientConfig::default());
    pump_until(&mut server, &mut client, 2000, |_, c, _| c.is_active());

    let pong = Message::Pong(Pong {
        ticks: unix_millis(),
    });
    assert_eq!(
        server
            .broadcast(&pong, DeliveryMode::ReliableOrdered)
            .unwrap(),
        1
    );
    assert_eq!(server.sessions().len(), 1);

    pump_until(&mut server, &mut client, 2000, |_, _, seen| {
        seen.iter().any(|e| matches!(e, ClientEvent::Pong { .. }))
    });
}
