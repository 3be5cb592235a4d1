//! Network Module
//!
//! TCP connections and the accept loop.
//!
//! ## Architecture
//! - Single acceptor thread (`Server::run`)
//! - Per connection: one reader thread that decodes and dispatches frames
//!   strictly in order, and one writer thread that drains the outbound queue
//! - Protocol tables shared read-only through an `Arc`

mod connection;
mod server;

pub use connection::{
    CloseCallback, CloseReason, Connection, ConnectionBuilder, ConnectionHandle, ConnectionState,
};
pub use server::{HandlerFactory, Server, ShutdownHandle};
