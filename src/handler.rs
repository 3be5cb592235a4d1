//! Handler capabilities
//!
//! One trait per (stage, receiving role) declares how that side reacts to
//! each packet kind of the stage. A connection owner supplies a single
//! `PacketHandler` and exposes the capabilities it participates in by
//! overriding the matching query; every other query answers `None`, which
//! makes packets for that capability fail with `UnsupportedPacket`.
//!
//! Adding a packet kind means one new method on one capability trait and
//! one new `Packet` type. No routing code changes.

use crate::error::Result;
use crate::network::{CloseReason, ConnectionHandle};
use crate::packet::{
    ApplyRegionAction, ChatBroadcast, ChatMessage, ClientKeepAlive, Disconnect, Hello,
    HelloAccepted, HelloRejected, LoginAccepted, LoginRejected, LoginRequest, Packet,
    RegionActionApplied, ServerKeepAlive,
};
use crate::protocol::{Role, Stage};

/// Entry point handed to every dispatched packet
pub trait PacketHandler: Send {
    fn handshake_server(&mut self) -> Option<&mut dyn HandshakeServer> {
        None
    }

    fn handshake_client(&mut self) -> Option<&mut dyn HandshakeClient> {
        None
    }

    fn login_server(&mut self) -> Option<&mut dyn LoginServer> {
        None
    }

    fn login_client(&mut self) -> Option<&mut dyn LoginClient> {
        None
    }

    fn session_server(&mut self) -> Option<&mut dyn SessionServer> {
        None
    }

    fn session_client(&mut self) -> Option<&mut dyn SessionClient> {
        None
    }
}

// =============================================================================
// Handshake
// =============================================================================

pub trait HandshakeServer {
    fn on_hello(&mut self, packet: Hello, ctx: &mut PacketContext<'_>) -> Result<()>;
}

pub trait HandshakeClient {
    fn on_hello_accepted(&mut self, packet: HelloAccepted, ctx: &mut PacketContext<'_>) -> Result<()>;

    fn on_hello_rejected(&mut self, packet: HelloRejected, ctx: &mut PacketContext<'_>) -> Result<()>;
}

// =============================================================================
// Login
// =============================================================================

pub trait LoginServer {
    fn on_login_request(&mut self, packet: LoginRequest, ctx: &mut PacketContext<'_>) -> Result<()>;
}

pub trait LoginClient {
    fn on_login_accepted(&mut self, packet: LoginAccepted, ctx: &mut PacketContext<'_>) -> Result<()>;

    fn on_login_rejected(&mut self, packet: LoginRejected, ctx: &mut PacketContext<'_>) -> Result<()>;
}

// =============================================================================
// Session
// =============================================================================

pub trait SessionServer {
    fn on_keep_alive(&mut self, packet: ClientKeepAlive, ctx: &mut PacketContext<'_>) -> Result<()>;

    fn on_chat_message(&mut self, packet: ChatMessage, ctx: &mut PacketContext<'_>) -> Result<()>;

    fn on_region_action(&mut self, packet: ApplyRegionAction, ctx: &mut PacketContext<'_>) -> Result<()>;
}

pub trait SessionClient {
    fn on_keep_alive(&mut self, packet: ServerKeepAlive, ctx: &mut PacketContext<'_>) -> Result<()>;

    fn on_chat_broadcast(&mut self, packet: ChatBroadcast, ctx: &mut PacketContext<'_>) -> Result<()>;

    /// The server is closing the session; the connection closes after this returns
    fn on_disconnect(&mut self, packet: Disconnect, ctx: &mut PacketContext<'_>) -> Result<()> {
        ctx.close_with(CloseReason::Kicked(packet.reason));
        Ok(())
    }

    fn on_region_action_applied(
        &mut self,
        _packet: RegionActionApplied,
        _ctx: &mut PacketContext<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Dispatch context
// =============================================================================

/// What a handler may do while reacting to one inbound packet
pub struct PacketContext<'a> {
    connection: &'a ConnectionHandle,
    role: Role,
    stage: Stage,
    advance_to: Option<Stage>,
}

impl<'a> PacketContext<'a> {
    pub(crate) fn new(connection: &'a ConnectionHandle, role: Role, stage: Stage) -> Self {
        Self {
            connection,
            role,
            stage,
            advance_to: None,
        }
    }

    /// The connection the packet arrived on
    pub fn connection(&self) -> &ConnectionHandle {
        self.connection
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Stage the packet was received in
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Queue a reply on the same connection
    pub fn send(&self, packet: &dyn Packet) -> Result<()> {
        self.connection.send(packet)
    }

    /// Move the connection to `stage` once this dispatch returns
    ///
    /// Frames already read keep their meaning; the next header is checked
    /// against the new stage.
    pub fn advance(&mut self, stage: Stage) {
        self.advance_to = Some(stage);
    }

    /// Close the connection, flushing replies queued so far
    pub fn close(&self) {
        self.connection.close();
    }

    pub(crate) fn close_with(&self, reason: CloseReason) {
        self.connection.close_with(reason);
    }

    pub(crate) fn requested_stage(&self) -> Option<Stage> {
        self.advance_to
    }
}
