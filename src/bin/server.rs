//! hearthwire Server Binary
//!
//! Runs the lobby over TCP.

use std::sync::Arc;

use clap::Parser;
use hearthwire::lobby::{Lobby, LobbyHandler};
use hearthwire::network::HandlerFactory;
use hearthwire::{Config, PacketHandler, ProtocolTables, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// hearthwire Server
#[derive(Parser, Debug)]
#[command(name = "hearthwire-server")]
#[command(about = "Lobby server for the hearthwire session protocol")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:25700")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "256")]
    max_connections: usize,

    /// Close connections silent for this long (milliseconds, 0 = never)
    #[arg(short, long, default_value = "30000")]
    idle_timeout_ms: u64,

    /// Name announced to clients
    #[arg(short, long, default_value = "hearthwire")]
    name: String,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hearthwire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("hearthwire Server v{}", hearthwire::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .idle_timeout_ms(args.idle_timeout_ms)
        .server_name(&args.name)
        .build();

    let tables = match ProtocolTables::standard() {
        Ok(tables) => Arc::new(tables),
        Err(e) => {
            tracing::error!("Failed to build protocol tables: {}", e);
            std::process::exit(1);
        }
    };

    let lobby = Lobby::new(config.server_name.clone());
    let factory: HandlerFactory = Arc::new(move || {
        Box::new(LobbyHandler::new(Arc::clone(&lobby))) as Box<dyn PacketHandler>
    });

    let server = match Server::bind(config, tables, factory) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
