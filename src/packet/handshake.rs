//! Handshake-stage packets

use crate::error::Result;
use crate::handler::{PacketContext, PacketHandler};
use crate::protocol::{Direction, ProtocolTables, Stage};
use crate::wire::{WireReader, WireWriter};

use super::{unsupported, Packet, PacketKind};

/// First packet a client sends
///
/// Payload: protocol_version (2) + client_name (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub protocol_version: u16,
    pub client_name: String,
}

impl Packet for Hello {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u16(self.protocol_version);
        out.write_str(&self.client_name)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.handshake_server() {
            Some(server) => server.on_hello(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for Hello {
    const STAGE: Stage = Stage::Handshake;
    const DIRECTION: Direction = Direction::ClientToServer;
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            protocol_version: reader.read_u16()?,
            client_name: reader.read_str()?,
        })
    }
}

/// Server accepted the handshake; the client moves on to login
///
/// Payload: server_name (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloAccepted {
    pub server_name: String,
}

impl Packet for HelloAccepted {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.server_name)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.handshake_client() {
            Some(client) => client.on_hello_accepted(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }

    fn advances_to(&self) -> Option<Stage> {
        Some(Stage::Login)
    }
}

impl PacketKind for HelloAccepted {
    const STAGE: Stage = Stage::Handshake;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            server_name: reader.read_str()?,
        })
    }
}

/// Server refused the handshake (usually a version mismatch)
///
/// Payload: reason (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRejected {
    pub reason: String,
}

impl Packet for HelloRejected {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.reason)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.handshake_client() {
            Some(client) => client.on_hello_rejected(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for HelloRejected {
    const STAGE: Stage = Stage::Handshake;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x01;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            reason: reader.read_str()?,
        })
    }
}
