//! SeqLog Server Binary
//!
//! Serves in-memory logs over TCP.

use std::sync::Arc;

use clap::Parser;
use seqlog::config::{parse_peers, BatchConfig};
use seqlog::log::{decorate, ChainConfig, ErrorCallback, LogCore, LogFactory, MemoryLog};
use seqlog::{Config, LogError, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the comma-separated peer list
const PEERS_ENV: &str = "SEQLOG_PEERS";

/// SeqLog Server
#[derive(Parser, Debug)]
#[command(name = "seqlog-server")]
#[command(about = "Network-transparent sequence-numbered logs")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Coalesce appends arriving within this many milliseconds (0 = off)
    #[arg(short = 'b', long, default_value = "0")]
    batch_interval_ms: u64,

    /// Flush a batch once it holds this many appends
    #[arg(long, default_value = "64")]
    batch_max_records: usize,

    /// Require a peer list in SEQLOG_PEERS
    #[arg(long)]
    require_peers: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seqlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("SeqLog Server v{}", seqlog::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let peers = match std::env::var(PEERS_ENV) {
        Ok(raw) => match parse_peers(&raw) {
            Ok(peers) => peers,
            Err(e) => {
                tracing::error!("Invalid {}: {}", PEERS_ENV, e);
                std::process::exit(1);
            }
        },
        Err(_) if args.require_peers => {
            tracing::error!("{} is not set", PEERS_ENV);
            std::process::exit(1);
        }
        Err(_) => Vec::new(),
    };
    if !peers.is_empty() {
        tracing::info!("Peers: {}", peers.join(", "));
    }

    let batch = if args.batch_interval_ms > 0 {
        BatchConfig::enabled(args.batch_interval_ms, args.batch_max_records)
    } else {
        BatchConfig::disabled()
    };

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .batch(batch)
        .peers(peers)
        .build();

    let on_error: ErrorCallback = Arc::new(|e: &LogError| {
        tracing::error!("Log could not be restarted: {}", e);
    });
    let chain = ChainConfig::from_config(&config).on_error(on_error);

    let factory = move |path: &str, _args: &[String]| -> seqlog::Result<Arc<dyn LogCore>> {
        tracing::debug!("Creating in-memory log {}", path);
        Ok(decorate(MemoryLog::new(), &chain))
    };
    let factory: Arc<dyn LogFactory> = Arc::new(factory);

    let server = match Server::bind(config, factory) {
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
