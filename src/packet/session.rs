//! Session-stage packets

use crate::error::Result;
use crate::handler::{PacketContext, PacketHandler};
use crate::protocol::{Direction, ProtocolTables, Stage};
use crate::wire::{WireReader, WireWriter};

use super::{unsupported, Packet, PacketKind, RegionAction, RegionPos};

// =============================================================================
// Client → Server
// =============================================================================

/// Liveness check from the client; the server echoes the nonce back
///
/// Payload: nonce (8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientKeepAlive {
    pub nonce: u64,
}

impl Packet for ClientKeepAlive {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u64(self.nonce);
        Ok(())
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_server() {
            Some(server) => server.on_keep_alive(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for ClientKeepAlive {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ClientToServer;
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            nonce: reader.read_u64()?,
        })
    }
}

/// Chat line typed by the client
///
/// Payload: text (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Packet for ChatMessage {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.text)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_server() {
            Some(server) => server.on_chat_message(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for ChatMessage {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ClientToServer;
    const ID: u8 = 0x01;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            text: reader.read_str()?,
        })
    }
}

/// Client requests an edit to a world region
///
/// Payload: region x (4) + region z (4) + action id (1) + action body
#[derive(Debug)]
pub struct ApplyRegionAction {
    pub region: RegionPos,
    pub action: Box<dyn RegionAction>,
}

impl ApplyRegionAction {
    pub fn new(region: RegionPos, action: impl RegionAction) -> Self {
        Self {
            region,
            action: Box::new(action),
        }
    }
}

impl PartialEq for ApplyRegionAction {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region && self.action.dyn_eq(other.action.as_ref())
    }
}

impl Packet for ApplyRegionAction {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        write_region_action(out, self.region, self.action.as_ref())
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_server() {
            Some(server) => server.on_region_action(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for ApplyRegionAction {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ClientToServer;
    const ID: u8 = 0x02;

    fn read_data(reader: &mut WireReader<'_>, tables: &ProtocolTables) -> Result<Self> {
        let (region, action) = read_region_action(reader, tables)?;
        Ok(Self { region, action })
    }
}

// =============================================================================
// Server → Client
// =============================================================================

/// Liveness check from the server, or the echo of a client check
///
/// Payload: nonce (8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerKeepAlive {
    pub nonce: u64,
}

impl Packet for ServerKeepAlive {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u64(self.nonce);
        Ok(())
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_client() {
            Some(client) => client.on_keep_alive(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for ServerKeepAlive {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            nonce: reader.read_u64()?,
        })
    }
}

/// Chat line relayed to every player in the session
///
/// Payload: sender (str) + text (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBroadcast {
    pub sender: String,
    pub text: String,
}

impl ChatBroadcast {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

impl Packet for ChatBroadcast {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.sender)?;
        out.write_str(&self.text)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_client() {
            Some(client) => client.on_chat_broadcast(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for ChatBroadcast {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x01;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            sender: reader.read_str()?,
            text: reader.read_str()?,
        })
    }
}

/// Server is ending the session
///
/// Payload: reason (str)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: String,
}

impl Disconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Packet for Disconnect {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_str(&self.reason)
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_client() {
            Some(client) => client.on_disconnect(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for Disconnect {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x02;

    fn read_data(reader: &mut WireReader<'_>, _tables: &ProtocolTables) -> Result<Self> {
        Ok(Self {
            reason: reader.read_str()?,
        })
    }
}

/// A region edit accepted by the server, relayed to every player
///
/// Payload: region x (4) + region z (4) + action id (1) + action body
#[derive(Debug)]
pub struct RegionActionApplied {
    pub region: RegionPos,
    pub action: Box<dyn RegionAction>,
}

impl PartialEq for RegionActionApplied {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region && self.action.dyn_eq(other.action.as_ref())
    }
}

impl Packet for RegionActionApplied {
    packet_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        write_region_action(out, self.region, self.action.as_ref())
    }

    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>) -> Result<()> {
        match handler.session_client() {
            Some(client) => client.on_region_action_applied(*self, ctx),
            None => Err(unsupported(&*self)),
        }
    }
}

impl PacketKind for RegionActionApplied {
    const STAGE: Stage = Stage::Session;
    const DIRECTION: Direction = Direction::ServerToClient;
    const ID: u8 = 0x03;

    fn read_data(reader: &mut WireReader<'_>, tables: &ProtocolTables) -> Result<Self> {
        let (region, action) = read_region_action(reader, tables)?;
        Ok(Self { region, action })
    }
}

impl From<ApplyRegionAction> for RegionActionApplied {
    fn from(request: ApplyRegionAction) -> Self {
        Self {
            region: request.region,
            action: request.action,
        }
    }
}

// =============================================================================
// Shared layout
// =============================================================================

fn write_region_action(out: &mut WireWriter, region: RegionPos, action: &dyn RegionAction) -> Result<()> {
    region.write(out);
    out.write_u8(action.id());
    action.write_data(out)
}

fn read_region_action(
    reader: &mut WireReader<'_>,
    tables: &ProtocolTables,
) -> Result<(RegionPos, Box<dyn RegionAction>)> {
    let region = RegionPos::read(reader)?;
    let action_id = reader.read_u8()?;
    let action = tables.decode_action(action_id, reader)?;
    Ok((region, action))
}
