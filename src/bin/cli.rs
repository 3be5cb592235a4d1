//! hearthwire CLI Client
//!
//! Logs into a lobby server and runs one command.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use crossbeam::channel::Receiver;
use hearthwire::lobby::{ClientEvent, LobbyClient};
use hearthwire::packet::{ChatMessage, ClientKeepAlive};
use hearthwire::{Config, ProtocolTables};
use tracing_subscriber::{fmt, EnvFilter};

/// hearthwire CLI
#[derive(Parser, Debug)]
#[command(name = "hearthwire-cli")]
#[command(about = "CLI for a hearthwire lobby server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:25700")]
    server: String,

    /// Username to log in with
    #[arg(short, long)]
    username: String,

    /// How long to wait for each server reply (milliseconds)
    #[arg(short, long, default_value = "3000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send chat lines and print what the server relays
    Chat {
        /// Lines to send, one message each
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Measure a keep-alive round trip
    Ping,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    if let Err(message) = run(args) {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let timeout = Duration::from_millis(args.timeout_ms);
    let tables = Arc::new(ProtocolTables::standard().map_err(|e| e.to_string())?);

    let (connection, events) = LobbyClient::connect(
        args.server.as_str(),
        args.username.as_str(),
        tables,
        Config::default(),
    )
    .map_err(|e| format!("cannot connect to {}: {}", args.server, e))?;

    // Wait for the login outcome
    loop {
        match next_event(&events, timeout)? {
            ClientEvent::Connected { server_name } => println!("connected to {}", server_name),
            ClientEvent::LoggedIn => break,
            ClientEvent::Rejected { reason } => return Err(format!("rejected: {}", reason)),
            other => print_event(&other),
        }
    }

    match args.command {
        Commands::Chat { lines } => {
            for line in &lines {
                connection.send(&ChatMessage::new(line.as_str())).map_err(|e| e.to_string())?;
            }
            // Our own lines come back in order once the server relays them
            let mut pending = lines.len();
            while pending > 0 {
                let event = next_event(&events, timeout)?;
                if let ClientEvent::Chat { sender, .. } = &event {
                    if *sender == args.username {
                        pending -= 1;
                    }
                }
                print_event(&event);
            }
        }
        Commands::Ping => {
            let nonce = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            let started = Instant::now();
            connection
                .send(&ClientKeepAlive { nonce })
                .map_err(|e| e.to_string())?;
            loop {
                match next_event(&events, timeout)? {
                    ClientEvent::KeepAlive { nonce: echoed } if echoed == nonce => {
                        println!("pong in {:?}", started.elapsed());
                        break;
                    }
                    other => print_event(&other),
                }
            }
        }
    }

    connection.close();
    connection.join();
    Ok(())
}

fn next_event(events: &Receiver<ClientEvent>, timeout: Duration) -> Result<ClientEvent, String> {
    match events.recv_timeout(timeout) {
        Ok(ClientEvent::Disconnected { reason }) => Err(format!("disconnected: {}", reason)),
        Ok(event) => Ok(event),
        Err(_) => Err("timed out waiting for the server".to_string()),
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Chat { sender, text } => println!("<{}> {}", sender, text),
        ClientEvent::RegionAction { region, action } => {
            println!("region ({}, {}) edited: {:?}", region.x, region.z, action)
        }
        other => tracing::debug!("{:?}", other),
    }
}
