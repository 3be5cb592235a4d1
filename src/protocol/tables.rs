//! Protocol Stage Tables
//!
//! Two packet registries per stage, one for each direction, plus the
//! registry for nested region actions.

use crate::error::{HearthError, Result};
use crate::packet::{
    self, decode_boxed, ActionKind, Packet, PacketKind, RegionAction,
};
use crate::registry::{Decoder, TypeRegistry};
use crate::wire::WireReader;

use super::{Direction, Stage};

/// Registry of packets for one (stage, direction) pair
pub type PacketRegistry = TypeRegistry<dyn Packet, ProtocolTables>;

/// Registry of region actions carried inside session packets
pub type ActionRegistry = TypeRegistry<dyn RegionAction>;

/// Every id namespace a connection may decode against
///
/// Built once at startup, then shared behind an `Arc` by all connections.
/// Registration needs `&mut self`, so a shared table can no longer change.
#[derive(Debug)]
pub struct ProtocolTables {
    /// Indexed by `[stage][direction]`
    packets: [[PacketRegistry; 2]; 3],

    actions: ActionRegistry,
}

impl ProtocolTables {
    /// Create tables with no packet kinds registered
    pub fn new() -> Self {
        let packets = Stage::ALL.map(|stage| {
            Direction::ALL.map(|direction| {
                PacketRegistry::new(format!("{}/{}", stage, direction))
            })
        });

        Self {
            packets,
            actions: ActionRegistry::new("region-action"),
        }
    }

    /// Tables with every built-in packet kind and region action
    pub fn standard() -> Result<Self> {
        let mut tables = Self::new();

        // Handshake
        tables.register_kind::<packet::Hello>()?;
        tables.register_kind::<packet::HelloAccepted>()?;
        tables.register_kind::<packet::HelloRejected>()?;

        // Login
        tables.register_kind::<packet::LoginRequest>()?;
        tables.register_kind::<packet::LoginAccepted>()?;
        tables.register_kind::<packet::LoginRejected>()?;

        // Session
        tables.register_kind::<packet::ClientKeepAlive>()?;
        tables.register_kind::<packet::ChatMessage>()?;
        tables.register_kind::<packet::ApplyRegionAction>()?;
        tables.register_kind::<packet::ServerKeepAlive>()?;
        tables.register_kind::<packet::ChatBroadcast>()?;
        tables.register_kind::<packet::Disconnect>()?;
        tables.register_kind::<packet::RegionActionApplied>()?;

        // Region actions
        tables.register_action::<packet::SetTile>()?;
        tables.register_action::<packet::Fill>()?;
        tables.register_action::<packet::Clear>()?;

        tracing::debug!(
            "Protocol tables ready: {} packet kinds, {} region actions",
            tables.packet_kind_count(),
            tables.actions.len()
        );

        Ok(tables)
    }

    /// Bind a decoder under `(stage, direction, id)`
    pub fn register(
        &mut self,
        stage: Stage,
        direction: Direction,
        id: u8,
        decoder: Decoder<dyn Packet, ProtocolTables>,
    ) -> Result<()> {
        self.packets[stage.index()][direction.index()].register(id, decoder)
    }

    /// Register a packet type under its own identity
    pub fn register_kind<P: PacketKind>(&mut self) -> Result<()> {
        self.register(P::STAGE, P::DIRECTION, P::ID, decode_boxed::<P>)
    }

    /// Register a region action type under its own id
    pub fn register_action<A: ActionKind>(&mut self) -> Result<()> {
        self.actions.register(A::ID, packet::decode_action_boxed::<A>)
    }

    /// The registry for one (stage, direction) pair
    pub fn table(&self, stage: Stage, direction: Direction) -> &PacketRegistry {
        &self.packets[stage.index()][direction.index()]
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Decode the body of packet `id` against exactly one (stage, direction) table
    pub fn decode(
        &self,
        stage: Stage,
        direction: Direction,
        id: u8,
        reader: &mut WireReader<'_>,
    ) -> Result<Box<dyn Packet>> {
        self.table(stage, direction).create(id, reader, self)
    }

    /// Decode a nested region action
    ///
    /// An unknown id here is a bad field inside an otherwise known packet.
    pub fn decode_action(&self, id: u8, reader: &mut WireReader<'_>) -> Result<Box<dyn RegionAction>> {
        self.actions.create(id, reader, &()).map_err(|e| match e {
            HearthError::UnknownId { namespace, id } => HearthError::MalformedPacket(format!(
                "unknown nested id {} in '{}'",
                id, namespace
            )),
            other => other,
        })
    }

    /// Total packet kinds across every stage and direction
    pub fn packet_kind_count(&self) -> usize {
        self.packets.iter().flatten().map(|table| table.len()).sum()
    }
}

impl Default for ProtocolTables {
    fn default() -> Self {
        Self::new()
    }
}
