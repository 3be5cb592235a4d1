//! Lobby
//!
//! Reference session layer on top of the protocol: version handshake,
//! unique usernames, chat, keep-alive echo and region edit relay.
//!
//! The server side is `LobbyHandler` (one per connection, sharing a
//! `Lobby`); the client side is `LobbyClient`, which turns dispatched
//! packets into `ClientEvent`s on a channel.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;

use crate::config::Config;
use crate::error::Result;
use crate::handler::{
    HandshakeClient, HandshakeServer, LoginClient, LoginServer, PacketContext, PacketHandler,
    SessionClient, SessionServer,
};
use crate::network::{CloseReason, Connection, ConnectionHandle};
use crate::packet::{
    ApplyRegionAction, ChatBroadcast, ChatMessage, ClientKeepAlive, Disconnect, Hello,
    HelloAccepted, HelloRejected, LoginAccepted, LoginRejected, LoginRequest, Packet, RegionAction,
    RegionActionApplied, RegionPos, ServerKeepAlive,
};
use crate::protocol::{ProtocolTables, Role, Stage};

/// Version sent in `Hello`; the server rejects anything else
pub const PROTOCOL_VERSION: u16 = 1;

/// Longest accepted username, in bytes
pub const MAX_USERNAME_LEN: usize = 32;

/// Sender name used for server-generated chat lines
pub const SERVER_SENDER: &str = "server";

// =============================================================================
// Server side
// =============================================================================

/// Players currently in the session, shared by every connection handler
pub struct Lobby {
    server_name: String,

    /// Username → connection
    players: RwLock<HashMap<String, ConnectionHandle>>,
}

impl Lobby {
    pub fn new(server_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            server_name: server_name.into(),
            players: RwLock::new(HashMap::new()),
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Logged-in usernames, sorted
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.players.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Send `packet` to every logged-in player
    pub fn broadcast(&self, packet: &dyn Packet) {
        for (name, handle) in self.players.read().iter() {
            if let Err(e) = handle.send(packet) {
                tracing::debug!("Broadcast to {} skipped: {}", name, e);
            }
        }
    }

    /// Send `Disconnect` to a player and close their connection
    pub fn kick(&self, username: &str, reason: &str) -> bool {
        let handle = self.players.read().get(username).cloned();
        match handle {
            Some(handle) => {
                let _ = handle.send(&Disconnect::new(reason));
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Claim `username` for `handle`; `Ok(false)` if it is taken
    ///
    /// `accept` runs under the write lock before the player becomes
    /// visible, so whatever it queues precedes every broadcast they get.
    fn join<F>(&self, username: &str, handle: &ConnectionHandle, accept: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut players = self.players.write();
        if players.contains_key(username) {
            return Ok(false);
        }
        accept()?;
        players.insert(username.to_string(), handle.clone());
        Ok(true)
    }

    /// Release `username` if it still belongs to connection `connection_id`
    fn leave(&self, username: &str, connection_id: u64) -> bool {
        let mut players = self.players.write();
        match players.get(username) {
            Some(handle) if handle.id() == connection_id => {
                players.remove(username);
                true
            }
            _ => false,
        }
    }
}

/// Per-connection server handler
pub struct LobbyHandler {
    lobby: Arc<Lobby>,

    /// Set once login succeeds: (username, connection id)
    player: Option<(String, u64)>,
}

impl LobbyHandler {
    pub fn new(lobby: Arc<Lobby>) -> Self {
        Self {
            lobby,
            player: None,
        }
    }

    fn username(&self) -> &str {
        self.player.as_ref().map(|(name, _)| name.as_str()).unwrap_or("?")
    }
}

impl Drop for LobbyHandler {
    fn drop(&mut self) {
        if let Some((username, connection_id)) = self.player.take() {
            if self.lobby.leave(&username, connection_id) {
                tracing::info!("{} left", username);
                self.lobby
                    .broadcast(&ChatBroadcast::new(SERVER_SENDER, format!("{} left", username)));
            }
        }
    }
}

impl PacketHandler for LobbyHandler {
    fn handshake_server(&mut self) -> Option<&mut dyn HandshakeServer> {
        Some(self)
    }

    fn login_server(&mut self) -> Option<&mut dyn LoginServer> {
        Some(self)
    }

    fn session_server(&mut self) -> Option<&mut dyn SessionServer> {
        Some(self)
    }
}

impl HandshakeServer for LobbyHandler {
    fn on_hello(&mut self, packet: Hello, ctx: &mut PacketContext<'_>) -> Result<()> {
        if packet.protocol_version != PROTOCOL_VERSION {
            tracing::info!(
                "Rejecting {} from {}: protocol {} (expected {})",
                packet.client_name,
                ctx.connection().peer_addr(),
                packet.protocol_version,
                PROTOCOL_VERSION
            );
            ctx.send(&HelloRejected {
                reason: format!(
                    "unsupported protocol version {} (server speaks {})",
                    packet.protocol_version, PROTOCOL_VERSION
                ),
            })?;
            ctx.close();
            return Ok(());
        }

        ctx.send(&HelloAccepted {
            server_name: self.lobby.server_name().to_string(),
        })?;
        ctx.advance(Stage::Login);
        Ok(())
    }
}

impl LoginServer for LobbyHandler {
    fn on_login_request(&mut self, packet: LoginRequest, ctx: &mut PacketContext<'_>) -> Result<()> {
        let username = packet.username.trim();

        let rejection = if username.is_empty() || username.len() > MAX_USERNAME_LEN {
            Some("invalid username")
        } else if username == SERVER_SENDER
            || !self
                .lobby
                .join(username, ctx.connection(), || ctx.send(&LoginAccepted))?
        {
            Some("duplicate username")
        } else {
            None
        };

        if let Some(reason) = rejection {
            tracing::info!("Login for {:?} rejected: {}", username, reason);
            ctx.send(&LoginRejected::new(reason))?;
            ctx.close();
            return Ok(());
        }

        self.player = Some((username.to_string(), ctx.connection().id()));
        ctx.advance(Stage::Session);

        tracing::info!("{} joined from {}", username, ctx.connection().peer_addr());
        self.lobby
            .broadcast(&ChatBroadcast::new(SERVER_SENDER, format!("{} joined", username)));
        Ok(())
    }
}

impl SessionServer for LobbyHandler {
    fn on_keep_alive(&mut self, packet: ClientKeepAlive, ctx: &mut PacketContext<'_>) -> Result<()> {
        ctx.send(&ServerKeepAlive { nonce: packet.nonce })
    }

    fn on_chat_message(&mut self, packet: ChatMessage, _ctx: &mut PacketContext<'_>) -> Result<()> {
        tracing::debug!("<{}> {}", self.username(), packet.text);
        self.lobby
            .broadcast(&ChatBroadcast::new(self.username(), packet.text));
        Ok(())
    }

    fn on_region_action(&mut self, packet: ApplyRegionAction, _ctx: &mut PacketContext<'_>) -> Result<()> {
        tracing::debug!("{} edits region {:?}: {:?}", self.username(), packet.region, packet.action);
        self.lobby.broadcast(&RegionActionApplied::from(packet));
        Ok(())
    }
}

// =============================================================================
// Client side
// =============================================================================

/// What a lobby client observed, in arrival order
#[derive(Debug, PartialEq)]
pub enum ClientEvent {
    /// Handshake accepted; the login request has been sent
    Connected { server_name: String },

    /// Handshake or login refused; the server closes the connection next
    Rejected { reason: String },

    LoggedIn,

    Chat { sender: String, text: String },

    KeepAlive { nonce: u64 },

    RegionAction {
        region: RegionPos,
        action: Box<dyn RegionAction>,
    },

    Disconnected { reason: String },
}

/// Client handler that logs in as `username` and reports events
pub struct LobbyClient {
    username: String,
    events: Sender<ClientEvent>,
}

impl LobbyClient {
    pub fn new(username: impl Into<String>) -> (Self, Receiver<ClientEvent>) {
        let (events, rx) = channel::unbounded();
        (
            Self {
                username: username.into(),
                events,
            },
            rx,
        )
    }

    /// Connect, send `Hello`, and log in as `username` once accepted
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        username: impl Into<String>,
        tables: Arc<ProtocolTables>,
        config: Config,
    ) -> Result<(Connection, Receiver<ClientEvent>)> {
        let username = username.into();
        let (handler, events) = Self::new(username.clone());

        let connection = Connection::builder(Role::Client, tables)
            .config(config)
            .connect(addr, Box::new(handler))?;

        connection.send(&Hello {
            protocol_version: PROTOCOL_VERSION,
            client_name: username,
        })?;

        Ok((connection, events))
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl PacketHandler for LobbyClient {
    fn handshake_client(&mut self) -> Option<&mut dyn HandshakeClient> {
        Some(self)
    }

    fn login_client(&mut self) -> Option<&mut dyn LoginClient> {
        Some(self)
    }

    fn session_client(&mut self) -> Option<&mut dyn SessionClient> {
        Some(self)
    }
}

impl HandshakeClient for LobbyClient {
    fn on_hello_accepted(&mut self, packet: HelloAccepted, ctx: &mut PacketContext<'_>) -> Result<()> {
        // Already tagged with the login stage, so it may go out before the transition lands
        ctx.send(&LoginRequest::new(self.username.clone()))?;
        self.emit(ClientEvent::Connected {
            server_name: packet.server_name,
        });
        Ok(())
    }

    fn on_hello_rejected(&mut self, packet: HelloRejected, _ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::Rejected {
            reason: packet.reason,
        });
        Ok(())
    }
}

impl LoginClient for LobbyClient {
    fn on_login_accepted(&mut self, _packet: LoginAccepted, _ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::LoggedIn);
        Ok(())
    }

    fn on_login_rejected(&mut self, packet: LoginRejected, _ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::Rejected {
            reason: packet.reason,
        });
        Ok(())
    }
}

impl SessionClient for LobbyClient {
    fn on_keep_alive(&mut self, packet: ServerKeepAlive, _ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::KeepAlive {
            nonce: packet.nonce,
        });
        Ok(())
    }

    fn on_chat_broadcast(&mut self, packet: ChatBroadcast, _ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::Chat {
            sender: packet.sender,
            text: packet.text,
        });
        Ok(())
    }

    fn on_disconnect(&mut self, packet: Disconnect, ctx: &mut PacketContext<'_>) -> Result<()> {
        self.emit(ClientEvent::Disconnected {
            reason: packet.reason.clone(),
        });
        ctx.close_with(CloseReason::Kicked(packet.reason));
        Ok(())
    }

    fn on_region_action_applied(
        &mut self,
        packet: RegionActionApplied,
        _ctx: &mut PacketContext<'_>,
    ) -> Result<()> {
        self.emit(ClientEvent::RegionAction {
            region: packet.region,
            action: packet.action,
        });
        Ok(())
    }
}
