//! Login-stage packets

use crate::error::Result;
use crate::handler::{PacketContext, PacketHandler};
use crate::protocol::{Direction, ProtocolTables, Stage};
use crate::wire::{WireReader, WireWriter};

use super::{unsupported, Packet, PacketKind};

/// Client asks to join under a username
///
/// Payload: username (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl Packet for LoginRequest {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.username)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.login_server() {
            Some(server) => server.on_login_request(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for LoginRequest {
    const STAGE: Stage = Stage::Login;
    const DIRECTION: Direction = Direction::ClientToServer;
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            username: reader.read_str()?,
        })
    }
}

/// Login succeeded; the client moves on to the session stage
///
/// Payload: empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAccepted;

impl Packet for LoginAccepted {
    packet_identity!();

    fn write_data(&self, _out: &mut WireWriter) -> Result<()> {
        Ok(())
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.login_client() {
            Some(client) => client.on_login_accepted(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }

    fn advances_to(&self) -> Option<Stage> {
        Some(Stage::Session)
    }
}

impl PacketKind for LoginAccepted {
    const STAGE: Stage = Stage::Login;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x00;

    fn read_data(_reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self)
    }
}

/// Login refused
///
/// Payload: reason (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRejected {
    pub reason: String,
}

impl LoginRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Packet for LoginRejected {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.reason)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.login_client() {
            Some(client) => client.on_login_rejected(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for LoginRejected {
    const STAGE: Stage = Stage::Login;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x01;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            reason: reader.read_str()?,
        })
    }
}
