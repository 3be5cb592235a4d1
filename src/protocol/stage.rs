//! Stage, direction and role
//!
//! Identity pieces shared by frame headers, registries and connections.

use std::fmt;

/// A named phase of a session, each with its own packet-id namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Stage {
    Handshake = 0x00,
    Login = 0x01,
    Session = 0x02,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Handshake, Stage::Login, Stage::Session];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Stage::Handshake),
            0x01 => Some(Stage::Login),
            0x02 => Some(Stage::Session),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Handshake => "handshake",
            Stage::Login => "login",
            Stage::Session => "session",
        };
        f.write_str(name)
    }
}

/// Who sent a packet, relative to the owner of its id namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    ClientToServer = 0x00,
    ServerToClient = 0x01,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::ClientToServer, Direction::ServerToClient];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Direction::ClientToServer),
            0x01 => Some(Direction::ServerToClient),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToServer => f.write_str("client->server"),
            Direction::ServerToClient => f.write_str("server->client"),
        }
    }
}

/// Which end of a connection this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Direction of packets this side sends
    pub fn outbound(self) -> Direction {
        match self {
            Role::Client => Direction::ClientToServer,
            Role::Server => Direction::ServerToClient,
        }
    }

    /// Direction of packets this side receives
    pub fn inbound(self) -> Direction {
        match self {
            Role::Client => Direction::ServerToClient,
            Role::Server => Direction::ClientToServer,
        }
    }
}
