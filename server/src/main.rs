use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::config::ServerConfig;
use server::coordinator::Coordinator;
use server::lobby::Lobby;
use server::network::Server;
use server::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Maximum number of connected clients
    #[clap(short, long, default_value = "64")]
    max_clients: usize,
    /// Seconds without activity before a table is ended
    #[clap(long, default_value = "1800")]
    idle_timeout_secs: u64,
    /// Seconds without a packet before a client is dropped
    #[clap(long, default_value = "30")]
    connection_timeout_secs: u64,
}

/// Parses command-line arguments, then runs the table server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config =
        ServerConfig::default().with_idle_timeout(Duration::from_secs(args.idle_timeout_secs));
    let lobby = Lobby::new(config, Arc::new(MemoryStore::new()));
    let coordinator = Coordinator::new(lobby);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        coordinator,
        args.max_clients,
        Duration::from_secs(args.connection_timeout_secs),
    )
    .await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with an error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
