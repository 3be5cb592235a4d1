//! TCP Server
//!
//! Accepts connections and gives each one its own handler.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::handler::PacketHandler;
use crate::protocol::{ProtocolTables, Role};

use super::{Connection, ConnectionHandle};

/// Builds the handler for each accepted connection
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn PacketHandler> + Send + Sync>;

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP server speaking the hearthwire protocol
pub struct Server {
    config: Config,
    tables: Arc<ProtocolTables>,
    factory: HandlerFactory,
    listener: TcpListener,

    /// Open connections by id; entries are removed by each connection's close callback
    connections: Arc<Mutex<HashMap<u64, ConnectionHandle>>>,

    shutdown: Arc<AtomicBool>,
}

/// Stops a running `Server::run` from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, tables: Arc<ProtocolTables>, factory: HandlerFactory) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the loop can observe shutdown requests
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            tables,
            factory,
            listener,
            connections: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Actual bound address (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shut down (blocking)
    ///
    /// On return every connection still open has been asked to close.
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;

                    if self.connection_count() >= self.config.max_connections {
                        tracing::warn!(
                            "Refusing {}: {} connections already open",
                            addr,
                            self.config.max_connections
                        );
                        continue;
                    }

                    let connections = Arc::clone(&self.connections);
                    // Held until the insert so the close callback cannot run first
                    let mut open = self.connections.lock();
                    let started = Connection::builder(Role::Server, Arc::clone(&self.tables))
                        .config(self.config.clone())
                        .on_close(move |handle, reason| {
                            connections.lock().remove(&handle.id());
                            tracing::debug!(
                                "Connection {} from {} ended: {:?}",
                                handle.id(),
                                handle.peer_addr(),
                                reason
                            );
                        })
                        .start(stream, (self.factory)());

                    match started {
                        Ok(connection) => {
                            let handle = connection.handle().clone();
                            open.insert(handle.id(), handle);
                        }
                        Err(e) => tracing::warn!("Failed to start connection for {}: {}", addr, e),
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    self.close_all();
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Server shutting down");
        self.close_all();
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Snapshot of the open connections
    pub fn connections(&self) -> Vec<ConnectionHandle> {
        self.connections.lock().values().cloned().collect()
    }

    fn close_all(&self) {
        for handle in self.connections() {
            handle.close();
        }
    }
}
