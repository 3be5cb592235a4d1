//! Connection Tests
//!
//! These tests verify:
//! - Inbound packets are dispatched in arrival order, one at a time
//! - Stage transitions on both sides of a real socket
//! - Close is idempotent and notifies the owner once
//! - Protocol violations close the connection with a protocol reason

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use hearthwire::handler::{HandshakeClient, HandshakeServer, LoginClient};
use hearthwire::network::{CloseReason, ConnectionState};
use hearthwire::packet::{
    ChatMessage, Hello, HelloAccepted, HelloRejected, LoginAccepted, LoginRejected,
};
use hearthwire::protocol::encode_frame;
use hearthwire::wire::WireWriter;
use hearthwire::{
    Config, Connection, ConnectionHandle, Direction, HearthError, Packet, PacketContext,
    PacketHandler, ProtocolTables, Result, Role, Stage,
};

// =============================================================================
// Helper Functions
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

fn tables() -> Arc<ProtocolTables> {
    Arc::new(ProtocolTables::standard().unwrap())
}

/// Connected (client, server-side socket) pair over loopback
fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}

/// Client and server connections talking to each other
fn connection_pair(
    client_handler: Box<dyn PacketHandler>,
    server_handler: Box<dyn PacketHandler>,
) -> (Connection, Connection) {
    let tables = tables();
    let (client_stream, server_stream) = socket_pair();

    let server = Connection::builder(Role::Server, Arc::clone(&tables))
        .start(server_stream, server_handler)
        .unwrap();
    let client = Connection::builder(Role::Client, tables)
        .start(client_stream, client_handler)
        .unwrap();

    (client, server)
}

/// Poll until the connection has a close reason
fn wait_for_close(handle: &ConnectionHandle) -> CloseReason {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if let Some(reason) = handle.close_reason() {
            return reason;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("connection {} never closed", handle.id());
}

fn wait_for_state(handle: &ConnectionHandle, state: ConnectionState) {
    let deadline = Instant::now() + WAIT;
    while handle.state() != state {
        assert!(Instant::now() < deadline, "stuck in {:?}", handle.state());
        thread::sleep(Duration::from_millis(5));
    }
}

/// Close callback that counts its calls and hands each reason to the test thread
fn close_recorder() -> (
    impl FnOnce(&ConnectionHandle, &CloseReason) + Send + 'static,
    Arc<AtomicUsize>,
    Receiver<CloseReason>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = channel::unbounded();
    let counter = Arc::clone(&calls);
    let callback = move |_: &ConnectionHandle, reason: &CloseReason| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(reason.clone());
    };
    (callback, calls, rx)
}

/// Closing a finished connection is a no-op
fn assert_close_is_noop(handle: &ConnectionHandle) {
    handle.close();
    handle.close();
    assert!(matches!(handle.send(&hello(1)), Err(HearthError::Closed)));
}

// =============================================================================
// Test Handlers
// =============================================================================

/// Exposes no capability at all
struct Deaf;

impl PacketHandler for Deaf {}

/// Server side that records every Hello and never overlaps two dispatches
struct HelloRecorder {
    seen: Sender<u16>,
    busy: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
    pause: Duration,
}

impl PacketHandler for HelloRecorder {
    fn handshake_server(&mut self) -> Option<&mut dyn HandshakeServer> {
        Some(self)
    }
}

impl HandshakeServer for HelloRecorder {
    fn on_hello(&mut self, packet: Hello, _ctx: &mut PacketContext<'_>) -> Result<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        self.busy.store(false, Ordering::SeqCst);

        let _ = self.seen.send(packet.protocol_version);
        Ok(())
    }
}

fn hello_recorder(pause: Duration) -> (HelloRecorder, Receiver<u16>, Arc<AtomicBool>) {
    let (tx, rx) = channel::unbounded();
    let overlapped = Arc::new(AtomicBool::new(false));
    let recorder = HelloRecorder {
        seen: tx,
        busy: Arc::new(AtomicBool::new(false)),
        overlapped: Arc::clone(&overlapped),
        pause,
    };
    (recorder, rx, overlapped)
}

/// Server that accepts the handshake and moves itself on to login
struct Greeter {
    reject: bool,
}

impl PacketHandler for Greeter {
    fn handshake_server(&mut self) -> Option<&mut dyn HandshakeServer> {
        Some(self)
    }
}

impl HandshakeServer for Greeter {
    fn on_hello(&mut self, _packet: Hello, ctx: &mut PacketContext<'_>) -> Result<()> {
        if self.reject {
            ctx.send(&HelloRejected {
                reason: "go away".into(),
            })?;
            ctx.close();
            return Ok(());
        }
        ctx.send(&HelloAccepted {
            server_name: "test".into(),
        })?;
        ctx.advance(Stage::Login);
        Ok(())
    }
}

/// Client side that reports handshake and login outcomes
struct Observer {
    events: Sender<String>,
}

impl PacketHandler for Observer {
    fn handshake_client(&mut self) -> Option<&mut dyn HandshakeClient> {
        Some(self)
    }

    fn login_client(&mut self) -> Option<&mut dyn LoginClient> {
        Some(self)
    }
}

impl HandshakeClient for Observer {
    fn on_hello_accepted(&mut self, packet: HelloAccepted, _ctx: &mut PacketContext<'_>) -> Result<()> {
        let _ = self.events.send(format!("accepted by {}", packet.server_name));
        Ok(())
    }

    fn on_hello_rejected(&mut self, packet: HelloRejected, _ctx: &mut PacketContext<'_>) -> Result<()> {
        let _ = self.events.send(format!("rejected: {}", packet.reason));
        Ok(())
    }
}

impl LoginClient for Observer {
    fn on_login_accepted(&mut self, _packet: LoginAccepted, ctx: &mut PacketContext<'_>) -> Result<()> {
        let _ = self.events.send(format!("logged in during {}", ctx.stage()));
        Ok(())
    }

    fn on_login_rejected(&mut self, packet: LoginRejected, _ctx: &mut PacketContext<'_>) -> Result<()> {
        let _ = self.events.send(format!("login rejected: {}", packet.reason));
        Ok(())
    }
}

fn hello(version: u16) -> Hello {
    Hello {
        protocol_version: version,
        client_name: "test-client".into(),
    }
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_packets_dispatch_in_send_order() {
    let (recorder, seen, _) = hello_recorder(Duration::ZERO);
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(recorder));

    for i in 0..200u16 {
        client.send(&hello(i)).unwrap();
    }

    let received: Vec<u16> = (0..200)
        .map(|_| seen.recv_timeout(WAIT).expect("hello not delivered"))
        .collect();
    assert_eq!(received, (0..200).collect::<Vec<u16>>());

    client.close();
    client.join();
    assert_eq!(wait_for_close(server.handle()), CloseReason::PeerDisconnected);
    server.join();
}

#[test]
fn test_dispatch_never_overlaps_with_concurrent_senders() {
    let (recorder, seen, overlapped) = hello_recorder(Duration::from_millis(1));
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(recorder));

    let senders: Vec<_> = (0..4u16)
        .map(|t| {
            let handle = client.handle().clone();
            thread::spawn(move || {
                for i in 0..25u16 {
                    handle.send(&hello(t * 100 + i)).unwrap();
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }

    let mut received: Vec<u16> = (0..100)
        .map(|_| seen.recv_timeout(WAIT).expect("hello not delivered"))
        .collect();

    assert!(!overlapped.load(Ordering::SeqCst));

    // Each sender's own packets stay in order
    for t in 0..4u16 {
        let mine: Vec<u16> = received.iter().copied().filter(|v| v / 100 == t).collect();
        assert_eq!(mine, (0..25).map(|i| t * 100 + i).collect::<Vec<u16>>());
    }
    received.sort_unstable();
    received.dedup();
    assert_eq!(received.len(), 100);

    client.close();
    client.join();
    server.join();
}

// =============================================================================
// Stage Tests
// =============================================================================

#[test]
fn test_both_sides_advance_after_accepted_handshake() {
    let (tx, events) = channel::unbounded();
    let (client, server) = connection_pair(
        Box::new(Observer { events: tx }),
        Box::new(Greeter { reject: false }),
    );
    assert_eq!(client.state(), ConnectionState::Handshake);

    client.send(&hello(1)).unwrap();

    assert_eq!(events.recv_timeout(WAIT).unwrap(), "accepted by test");
    wait_for_state(client.handle(), ConnectionState::Login);
    wait_for_state(server.handle(), ConnectionState::Login);
    assert_eq!(client.handle().stage(), Some(Stage::Login));

    client.close();
    client.join();
    server.join();
}

#[test]
fn test_reply_queued_before_close_is_delivered() {
    let (tx, events) = channel::unbounded();
    let (client, server) = connection_pair(
        Box::new(Observer { events: tx }),
        Box::new(Greeter { reject: true }),
    );

    client.send(&hello(1)).unwrap();

    assert_eq!(events.recv_timeout(WAIT).unwrap(), "rejected: go away");
    assert_eq!(wait_for_close(server.handle()), CloseReason::Local);
    assert_eq!(wait_for_close(client.handle()), CloseReason::PeerDisconnected);

    let handle = client.handle().clone();
    server.join();
    client.join();
    assert_eq!(handle.state(), ConnectionState::Closed);
}

#[test]
fn test_duplicate_stage_advance_is_a_protocol_error() {
    let tables = tables();
    let (client_stream, mut raw_server) = socket_pair();
    let (tx, events) = channel::unbounded();

    let client = Connection::builder(Role::Client, tables)
        .start(client_stream, Box::new(Observer { events: tx }))
        .unwrap();

    for frame in [
        encode_frame(&HelloAccepted {
            server_name: "raw".into(),
        })
        .unwrap(),
        encode_frame(&LoginAccepted).unwrap(),
        encode_frame(&LoginAccepted).unwrap(),
    ] {
        raw_server.write_all(&frame).unwrap();
    }

    assert_eq!(events.recv_timeout(WAIT).unwrap(), "accepted by raw");
    assert_eq!(events.recv_timeout(WAIT).unwrap(), "logged in during login");

    match wait_for_close(client.handle()) {
        CloseReason::Protocol(msg) => assert!(msg.contains("Unexpected frame"), "{}", msg),
        other => panic!("Expected a protocol close, got {:?}", other),
    }
    // The second LoginAccepted was never dispatched
    assert!(events.try_recv().is_err());

    client.join();
}

#[test]
fn test_frame_for_another_stage_closes_connection() {
    let (recorder, _seen, _) = hello_recorder(Duration::ZERO);
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(recorder));

    // Still in handshake on the server; a session frame is out of place
    client.send(&ChatMessage::new("too early")).unwrap();

    match wait_for_close(server.handle()) {
        CloseReason::Protocol(msg) => assert!(msg.contains("Unexpected frame")),
        other => panic!("Expected a protocol close, got {:?}", other),
    }

    client.close();
    client.join();
    server.join();
}

// =============================================================================
// Protocol Error Tests
// =============================================================================

#[test]
fn test_missing_capability_is_unsupported() {
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(Deaf));

    client.send(&hello(1)).unwrap();

    match wait_for_close(server.handle()) {
        CloseReason::Protocol(msg) => assert!(msg.contains("Unsupported packet")),
        other => panic!("Expected a protocol close, got {:?}", other),
    }

    client.join();
    server.join();
}

/// A client packet whose id no table knows
#[derive(Debug)]
struct Bogus;

impl Packet for Bogus {
    fn stage(&self) -> Stage {
        Stage::Handshake
    }

    fn direction(&self) -> Direction {
        Direction::ClientToServer
    }

    fn id(&self) -> u8 {
        42
    }

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u32(0xDEAD_BEEF);
        Ok(())
    }

    fn dispatch(
        self: Box<Self>,
        _handler: &mut dyn PacketHandler,
        _ctx: &mut PacketContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn test_unknown_id_closes_connection() {
    let (recorder, seen, _) = hello_recorder(Duration::ZERO);
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(recorder));

    client.send(&hello(7)).unwrap();
    client.send(&Bogus).unwrap();
    client.send(&hello(8)).unwrap();

    match wait_for_close(server.handle()) {
        CloseReason::Protocol(msg) => assert!(msg.contains("Unknown id 42")),
        other => panic!("Expected a protocol close, got {:?}", other),
    }
    // Nothing after the bad frame is dispatched
    assert_eq!(seen.recv_timeout(WAIT).unwrap(), 7);
    assert!(seen.recv_timeout(Duration::from_millis(100)).is_err());

    client.join();
    server.join();
}

// =============================================================================
// Send and Close Tests
// =============================================================================

#[test]
fn test_send_in_wrong_direction_is_rejected() {
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(Deaf));

    match client.send(&HelloAccepted {
        server_name: "nope".into(),
    }) {
        Err(HearthError::WrongDirection { direction, id }) => {
            assert_eq!(direction, Direction::ServerToClient);
            assert_eq!(id, 0);
        }
        other => panic!("Expected WrongDirection, got {:?}", other),
    }
    assert!(!client.handle().is_closed());

    client.close();
    client.join();
    server.join();
}

#[test]
fn test_send_after_close_fails() {
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(Deaf));

    client.close();
    assert!(matches!(client.send(&hello(1)), Err(HearthError::Closed)));

    client.join();
    server.join();
}

#[test]
fn test_oversized_send_fails_without_closing() {
    let (client, server) = connection_pair(Box::new(Deaf), Box::new(Deaf));
    let long = Hello {
        protocol_version: 1,
        client_name: "x".repeat(5000),
    };

    match client.send(&long) {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("exceeds limit of 4096")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
    assert!(!client.handle().is_closed());
    assert!(client.send(&hello(1)).is_ok());

    client.close();
    client.join();
    server.join();
}

#[test]
fn test_raised_string_limit_applies_to_both_ends() {
    let tables = tables();
    let (client_stream, server_stream) = socket_pair();
    let config = Config::builder().max_string_len(8000).build();
    let (recorder, seen, _) = hello_recorder(Duration::ZERO);

    let server = Connection::builder(Role::Server, Arc::clone(&tables))
        .config(config.clone())
        .start(server_stream, Box::new(recorder))
        .unwrap();
    let client = Connection::builder(Role::Client, tables)
        .config(config)
        .start(client_stream, Box::new(Deaf))
        .unwrap();

    client
        .send(&Hello {
            protocol_version: 3,
            client_name: "x".repeat(5000),
        })
        .unwrap();
    assert_eq!(seen.recv_timeout(WAIT).unwrap(), 3);
    assert!(!server.handle().is_closed());

    client.close();
    client.join();
    server.join();
}

#[test]
fn test_close_is_idempotent() {
    let tables = tables();
    let (client_stream, server_stream) = socket_pair();
    let (on_close, calls, reasons) = close_recorder();

    let server = Connection::builder(Role::Server, Arc::clone(&tables))
        .start(server_stream, Box::new(Deaf))
        .unwrap();
    let client = Connection::builder(Role::Client, tables)
        .on_close(on_close)
        .start(client_stream, Box::new(Deaf))
        .unwrap();

    let racers: Vec<_> = (0..4)
        .map(|_| {
            let handle = client.handle().clone();
            thread::spawn(move || handle.close())
        })
        .collect();
    client.close();
    for racer in racers {
        racer.join().unwrap();
    }
    client.close();

    let handle = client.handle().clone();
    client.join();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reasons.try_recv(), Ok(CloseReason::Local));
    assert!(reasons.try_recv().is_err());
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert_eq!(handle.close_reason(), Some(CloseReason::Local));

    server.join();
}

#[test]
fn test_close_races_peer_hang_up() {
    for _ in 0..20 {
        let (client_stream, raw_server) = socket_pair();
        let (on_close, calls, reasons) = close_recorder();

        let client = Connection::builder(Role::Client, tables())
            .on_close(on_close)
            .start(client_stream, Box::new(Deaf))
            .unwrap();
        client.send(&hello(1)).unwrap();

        let start = Arc::new(Barrier::new(2));
        let peer = {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                drop(raw_server);
            })
        };
        start.wait();
        client.close();
        peer.join().unwrap();

        let handle = client.handle().clone();
        client.join();
        assert_close_is_noop(&handle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let reason = reasons.try_recv().unwrap();
        assert!(
            matches!(reason, CloseReason::Local | CloseReason::PeerDisconnected),
            "unexpected reason {:?}",
            reason
        );
        assert!(reasons.try_recv().is_err());
        assert_eq!(handle.close_reason(), Some(reason));
        assert_eq!(handle.state(), ConnectionState::Closed);
    }
}

#[test]
fn test_owner_close_after_error_close_changes_nothing() {
    let (client_stream, mut raw_server) = socket_pair();
    let (on_close, calls, reasons) = close_recorder();

    let client = Connection::builder(Role::Client, tables())
        .on_close(on_close)
        .start(client_stream, Box::new(Deaf))
        .unwrap();

    // Stage byte 9 does not exist
    raw_server.write_all(&[0x09, 0x01, 0x00]).unwrap();
    let reason = reasons.recv_timeout(WAIT).unwrap();
    match &reason {
        CloseReason::Protocol(msg) => assert!(msg.contains("stage"), "{}", msg),
        other => panic!("Expected a protocol close, got {:?}", other),
    }

    let handle = client.handle().clone();
    let closers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.close())
        })
        .collect();
    client.close();
    for closer in closers {
        closer.join().unwrap();
    }
    client.join();
    assert_close_is_noop(&handle);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(reasons.try_recv().is_err());
    assert_eq!(handle.close_reason(), Some(reason));
    assert_eq!(handle.state(), ConnectionState::Closed);
}

#[test]
fn test_idle_connection_times_out() {
    let tables = tables();
    let (client_stream, server_stream) = socket_pair();

    let config = Config::builder().idle_timeout_ms(100).build();
    let server = Connection::builder(Role::Server, Arc::clone(&tables))
        .config(config)
        .start(server_stream, Box::new(Deaf))
        .unwrap();
    let client = Connection::builder(Role::Client, tables)
        .start(client_stream, Box::new(Deaf))
        .unwrap();

    assert_eq!(wait_for_close(server.handle()), CloseReason::IdleTimeout);
    assert_eq!(wait_for_close(client.handle()), CloseReason::PeerDisconnected);

    server.join();
    client.join();
}
