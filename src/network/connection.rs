//! Connection
//!
//! One peer, one socket, two threads.
//!
//! ## Lifecycle
//! ```text
//! CONNECTING → HANDSHAKE → LOGIN → SESSION → CLOSING → CLOSED
//!                   └─────────┴────────┴──────────↑
//! ```
//! Stages advance only while an inbound packet is being handled. Any state
//! can move to CLOSING (owner close, I/O failure, protocol error, idle
//! timeout, peer hang-up); the first trigger wins and the owner's close
//! callback runs exactly once, after the writer thread has stopped.

use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{HearthError, Result};
use crate::handler::{PacketContext, PacketHandler};
use crate::packet::Packet;
use crate::protocol::{encode_frame_with_limit, FrameHeader, ProtocolTables, Role, Stage};
use crate::wire::WireReader;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshake,
    Login,
    Session,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Protocol stage for the open states
    pub fn stage(self) -> Option<Stage> {
        match self {
            ConnectionState::Handshake => Some(Stage::Handshake),
            ConnectionState::Login => Some(Stage::Login),
            ConnectionState::Session => Some(Stage::Session),
            _ => None,
        }
    }
}

impl From<Stage> for ConnectionState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Handshake => ConnectionState::Handshake,
            Stage::Login => ConnectionState::Login,
            Stage::Session => ConnectionState::Session,
        }
    }
}

/// Why a connection closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by its owner or by a handler
    Local,

    /// The peer hung up
    PeerDisconnected,

    /// Nothing arrived within the idle timeout
    IdleTimeout,

    /// The server ended the session with a `Disconnect` packet
    Kicked(String),

    /// Unknown id, malformed body, unsupported packet or a frame for the wrong stage
    Protocol(String),

    /// Socket failure
    Io(String),
}

impl CloseReason {
    /// Whether frames queued before the close still get written
    pub fn flushes_queue(&self) -> bool {
        matches!(self, CloseReason::Local)
    }

    fn from_error(err: HearthError) -> Self {
        match err {
            HearthError::Io(e) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => CloseReason::IdleTimeout,
                ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof => CloseReason::PeerDisconnected,
                _ => CloseReason::Io(e.to_string()),
            },
            HearthError::Closed => CloseReason::Local,
            other => CloseReason::Protocol(other.to_string()),
        }
    }
}

/// Owner notification, run once when the connection reaches CLOSED
pub type CloseCallback = Box<dyn FnOnce(&ConnectionHandle, &CloseReason) + Send>;

enum Outbound {
    Frame(Bytes),
    Shutdown,
}

/// State shared by the owner, the handler context and both threads
struct Shared {
    id: u64,
    role: Role,
    peer_addr: String,

    state: Mutex<ConnectionState>,

    /// Set by the first close trigger
    closing: AtomicBool,

    /// Set when queued frames must be dropped instead of written
    discard: AtomicBool,

    /// Longest string the peer accepts; outbound packets are held to it too
    max_string_len: usize,

    reason: Mutex<Option<CloseReason>>,

    outbound: Sender<Outbound>,

    /// Clone of the socket, used only to shut it down
    socket: TcpStream,

    on_close: Mutex<Option<CloseCallback>>,
}

/// Cheap, cloneable access to a running connection
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn peer_addr(&self) -> &str {
        &self.shared.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Current protocol stage, `None` once closing
    pub fn stage(&self) -> Option<Stage> {
        self.state().stage()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Reason recorded by the first close trigger
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.reason.lock().clone()
    }

    /// Queue a packet for the peer
    ///
    /// The packet is serialized before this returns, so the caller may reuse
    /// it immediately. Never waits for the socket. Frames reach the wire in
    /// the order `send` was called and never interleave. A packet with a
    /// string over `Config::max_string_len` fails here with `MalformedPacket`
    /// and the connection stays open.
    pub fn send(&self, packet: &dyn Packet) -> Result<()> {
        if packet.direction() != self.shared.role.outbound() {
            return Err(HearthError::WrongDirection {
                direction: packet.direction(),
                id: packet.id(),
            });
        }
        if self.is_closed() {
            return Err(HearthError::Closed);
        }

        let frame = encode_frame_with_limit(packet, self.shared.max_string_len)?;
        tracing::trace!(
            "Queue {:?} ({} bytes) for connection {}",
            FrameHeader::of(packet),
            frame.len(),
            self.shared.id
        );

        self.shared
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| HearthError::Closed)
    }

    /// Close the connection after writing what is already queued
    pub fn close(&self) {
        self.close_with(CloseReason::Local);
    }

    /// Begin closing; later calls are ignored
    pub(crate) fn close_with(&self, reason: CloseReason) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::debug!("Closing connection {} ({}): {:?}", self.shared.id, self.shared.peer_addr, reason);

        let flush = reason.flushes_queue();
        *self.shared.reason.lock() = Some(reason);
        *self.shared.state.lock() = ConnectionState::Closing;

        if flush {
            // Unblock the reader; the writer still owns the write half
            let _ = self.shared.socket.shutdown(Shutdown::Read);
        } else {
            self.shared.discard.store(true, Ordering::Release);
            let _ = self.shared.socket.shutdown(Shutdown::Both);
        }

        let _ = self.shared.outbound.send(Outbound::Shutdown);
    }

    /// Apply a stage transition requested while handling an inbound packet
    fn advance(&self, from: Stage, to: Stage) {
        let mut state = self.shared.state.lock();
        if state.stage() != Some(from) || to <= from {
            // Closing, or not a forward move
            return;
        }
        *state = ConnectionState::from(to);
        tracing::debug!("Connection {} advanced {} -> {}", self.shared.id, from, to);
    }

    /// Close a connection whose writer never started
    ///
    /// Nobody else will run `finish`, so it happens here.
    fn abandon(&self, reason: CloseReason) {
        self.close_with(reason);
        self.finish();
    }

    fn finish(&self) {
        let _ = self.shared.socket.shutdown(Shutdown::Both);
        *self.shared.state.lock() = ConnectionState::Closed;

        let reason = self.close_reason().unwrap_or(CloseReason::Local);
        let callback = self.shared.on_close.lock().take();
        if let Some(callback) = callback {
            callback(self, &reason);
        }
        tracing::debug!("Connection {} closed", self.shared.id);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .field("role", &self.shared.role)
            .field("peer_addr", &self.shared.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for a connection
pub struct ConnectionBuilder {
    role: Role,
    tables: Arc<ProtocolTables>,
    config: Config,
    on_close: Option<CloseCallback>,
}

impl ConnectionBuilder {
    /// Use these timeouts and codec limits
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Run `callback` once the connection is fully closed
    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ConnectionHandle, &CloseReason) + Send + 'static,
    {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Connect to `addr` and start both threads
    pub fn connect<A: ToSocketAddrs>(self, addr: A, handler: Box<dyn PacketHandler>) -> Result<Connection> {
        let stream = TcpStream::connect(addr)?;
        self.start(stream, handler)
    }

    /// Start both threads on an already connected socket
    pub fn start(self, stream: TcpStream, handler: Box<dyn PacketHandler>) -> Result<Connection> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.config.idle_timeout())?;
        stream.set_write_timeout(self.config.write_timeout())?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream.try_clone()?;

        let (tx, rx) = channel::unbounded();
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

        let handle = ConnectionHandle {
            shared: Arc::new(Shared {
                id,
                role: self.role,
                peer_addr,
                state: Mutex::new(ConnectionState::Connecting),
                closing: AtomicBool::new(false),
                discard: AtomicBool::new(false),
                max_string_len: self.config.max_string_len,
                reason: Mutex::new(None),
                outbound: tx,
                socket: stream,
                on_close: Mutex::new(self.on_close),
            }),
        };

        let writer = {
            let handle = handle.clone();
            thread::Builder::new()
                .name(format!("hearthwire-writer-{}", id))
                .spawn(move || write_loop(handle, write_stream, rx))
        };

        let writer = match writer {
            Ok(writer) => writer,
            Err(e) => {
                handle.abandon(CloseReason::Io(e.to_string()));
                return Err(HearthError::Io(e));
            }
        };

        *handle.shared.state.lock() = ConnectionState::Handshake;

        let reader = {
            let handle = handle.clone();
            let tables = Arc::clone(&self.tables);
            let max_string_len = self.config.max_string_len;
            thread::Builder::new()
                .name(format!("hearthwire-reader-{}", id))
                .spawn(move || read_loop(handle, read_stream, tables, handler, max_string_len))
        };

        let reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                // The writer is running and will finish the close
                handle.close_with(CloseReason::Io(e.to_string()));
                return Err(HearthError::Io(e));
            }
        };

        tracing::debug!(
            "Connection {} established with {} as {:?}",
            id,
            handle.peer_addr(),
            handle.role()
        );

        Ok(Connection {
            handle,
            reader: Some(reader),
            writer: Some(writer),
        })
    }
}

/// Owner side of a connection: the handle plus its two threads
pub struct Connection {
    handle: ConnectionHandle,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start configuring a connection for `role`
    pub fn builder(role: Role, tables: Arc<ProtocolTables>) -> ConnectionBuilder {
        ConnectionBuilder {
            role,
            tables,
            config: Config::default(),
            on_close: None,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn send(&self, packet: &dyn Packet) -> Result<()> {
        self.handle.send(packet)
    }

    pub fn close(&self) {
        self.handle.close();
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Wait for both threads to finish
    pub fn join(mut self) {
        for thread in [self.reader.take(), self.writer.take()].into_iter().flatten() {
            if thread.join().is_err() {
                tracing::warn!("Connection {} thread panicked", self.handle.id());
            }
        }
    }
}

// =============================================================================
// Threads
// =============================================================================

fn read_loop(
    handle: ConnectionHandle,
    stream: TcpStream,
    tables: Arc<ProtocolTables>,
    mut handler: Box<dyn PacketHandler>,
    max_string_len: usize,
) {
    let mut reader = BufReader::new(stream);

    let reason = loop {
        if handle.is_closed() {
            break None;
        }
        let mut wire = WireReader::with_limit(&mut reader, max_string_len);
        match read_one(&handle, &tables, handler.as_mut(), &mut wire) {
            Ok(true) => continue,
            Ok(false) => break Some(CloseReason::PeerDisconnected),
            Err(_) if handle.is_closed() => break None,
            Err(e) => {
                let reason = CloseReason::from_error(e);
                if matches!(reason, CloseReason::Protocol(_) | CloseReason::Io(_)) {
                    tracing::warn!("Connection {} ({}): {:?}", handle.id(), handle.peer_addr(), reason);
                }
                break Some(reason);
            }
        }
    };

    if let Some(reason) = reason {
        handle.close_with(reason);
    }
}

/// Read, decode and dispatch one frame; `Ok(false)` on a clean end of stream
fn read_one(
    handle: &ConnectionHandle,
    tables: &ProtocolTables,
    handler: &mut dyn PacketHandler,
    wire: &mut WireReader<'_>,
) -> Result<bool> {
    let header = match FrameHeader::read(wire)? {
        Some(header) => header,
        None => return Ok(false),
    };

    let stage = handle.stage().ok_or(HearthError::Closed)?;
    let expected_direction = handle.role().inbound();
    if header.stage != stage || header.direction != expected_direction {
        return Err(HearthError::UnexpectedFrame {
            expected_stage: stage,
            expected_direction,
            stage: header.stage,
            direction: header.direction,
        });
    }

    let packet = tables.decode(header.stage, header.direction, header.id, wire)?;
    tracing::trace!("Connection {} received {:?}", handle.id(), packet);

    let advance = packet.advances_to();
    let mut ctx = PacketContext::new(handle, handle.role(), stage);
    packet.dispatch(handler, &mut ctx)?;

    if let Some(next) = ctx.requested_stage().or(advance) {
        handle.advance(stage, next);
    }

    Ok(true)
}

fn write_loop(handle: ConnectionHandle, stream: TcpStream, rx: Receiver<Outbound>) {
    let mut writer = BufWriter::new(stream);

    for message in rx.iter() {
        let frame = match message {
            Outbound::Frame(frame) => frame,
            Outbound::Shutdown => break,
        };
        if handle.shared.discard.load(Ordering::Acquire) {
            continue;
        }

        let mut result = writer.write_all(&frame);
        // Batch small frames; flush once the queue runs dry
        if result.is_ok() && rx.is_empty() {
            result = writer.flush();
        }
        if let Err(e) = result {
            handle.close_with(CloseReason::from_error(HearthError::Io(e)));
        }
    }

    if !handle.shared.discard.load(Ordering::Acquire) {
        if let Err(e) = writer.flush() {
            tracing::debug!("Connection {} final flush failed: {}", handle.id(), e);
        }
    }

    handle.finish();
}
