//! SeqLog CLI Client
//!
//! Command-line interface for interacting with a SeqLog server.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use seqlog::{Config, LogClient, LogCore};
use tracing_subscriber::{fmt, EnvFilter};

/// SeqLog CLI
#[derive(Parser, Debug)]
#[command(name = "seqlog-cli")]
#[command(about = "CLI for SeqLog servers")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value = "10000")]
    timeout_ms: u64,

    /// Constructor argument passed to the server's log factory (repeatable)
    #[arg(short, long = "arg")]
    args: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a log and print its seq and head
    Start {
        /// Log path
        path: String,
    },

    /// Append a record
    Append {
        /// Log path
        path: String,

        /// Record contents
        data: String,

        /// Fail unless the log is at this seq
        #[arg(short, long)]
        expect: Option<i64>,
    },

    /// Append several records atomically
    Batch {
        /// Log path
        path: String,

        /// Record contents, in order
        #[arg(required = true)]
        data: Vec<String>,
    },

    /// Discard records after a seq (-1 empties the log)
    Truncate {
        /// Log path
        path: String,

        /// Last seq to keep
        #[arg(allow_hyphen_values = true)]
        seq: i64,
    },

    /// Delete a log
    Del {
        /// Log path
        path: String,
    },
}

impl Commands {
    fn path(&self) -> &str {
        match self {
            Commands::Start { path }
            | Commands::Append { path, .. }
            | Commands::Batch { path, .. }
            | Commands::Truncate { path, .. }
            | Commands::Del { path } => path,
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> seqlog::Result<()> {
    let config = Config::builder()
        .listen_addr(&args.server)
        .request_timeout_ms(args.timeout_ms)
        .build();
    let client = LogClient::new(&args.server, args.command.path(), args.args.clone(), config);

    match args.command {
        Commands::Start { .. } => {
            client.start()?;
            print_state(&client);
        }
        Commands::Append { data, expect, .. } => {
            client.start()?;
            let seq = client.append(Bytes::from(data), expect)?;
            println!("seq: {}", seq);
        }
        Commands::Batch { data, .. } => {
            client.start()?;
            let records = data.into_iter().map(Bytes::from).collect();
            let first = client.append_batch(records, None)?;
            println!("first: {}", first);
            print_state(&client);
        }
        Commands::Truncate { seq, .. } => {
            client.start()?;
            client.truncate(seq)?;
            print_state(&client);
        }
        Commands::Del { .. } => {
            client.connect()?;
            client.delete()?;
            println!("deleted");
        }
    }

    Ok(())
}

fn print_state(client: &LogClient) {
    println!("seq: {}", client.seq());
    match client.head() {
        Some(head) => println!("head: {}", String::from_utf8_lossy(&head)),
        None => println!("head: (empty)"),
    }
}
